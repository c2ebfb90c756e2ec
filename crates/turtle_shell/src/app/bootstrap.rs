use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use turtle_engine::TurtleConfig;

use super::input::InputSource;

pub(crate) struct AppWiring {
    pub(crate) config: TurtleConfig,
    pub(crate) input: InputSource,
}

pub(crate) fn build_app() -> Result<AppWiring, ExitCode> {
    init_tracing();
    info!("=== Turtle Shell Startup ===");

    let config = match TurtleConfig::load() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "config_load_failed");
            return Err(ExitCode::FAILURE);
        }
    };
    let input = input_source_from_args(std::env::args().skip(1));
    info!(input = %input, "input_source");

    Ok(AppWiring { config, input })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn input_source_from_args(mut args: impl Iterator<Item = String>) -> InputSource {
    match args.next() {
        Some(path) if path != "-" => InputSource::Script(PathBuf::from(path)),
        _ => InputSource::Stdin,
    }
}
