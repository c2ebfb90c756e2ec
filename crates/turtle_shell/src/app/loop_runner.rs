use std::io::{self, Write};
use std::process::ExitCode;

use tracing::{error, info, warn};
use turtle_engine::{run_headless, CommandDispatcher, DispatchEvent, MetricsHandle};

use super::bootstrap::AppWiring;
use super::input::spawn_input_pump;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut dispatcher = CommandDispatcher::new(app.config.dispatcher_settings());
    let pump = match spawn_input_pump(app.input.clone(), dispatcher.sender()) {
        Ok(pump) => pump,
        Err(err) => {
            error!(input = %app.input, error = %err, "input_open_failed");
            return ExitCode::FAILURE;
        }
    };

    let metrics_handle = MetricsHandle::default();
    let stdout = io::stdout();
    run_headless(
        &app.config.loop_config(),
        &mut dispatcher,
        &metrics_handle,
        |dispatcher| !(pump.is_finished() && dispatcher.is_idle()),
        |event| emit_event(&mut stdout.lock(), &event),
    );

    let last_metrics = metrics_handle.snapshot();
    info!(
        commands_completed = dispatcher.commands_completed(),
        active_actors = dispatcher.pool().active_count(),
        dropped_events = dispatcher.dropped_events(),
        last_tps = last_metrics.tps,
        "session_finished"
    );
    ExitCode::SUCCESS
}

fn emit_event<W: Write>(out: &mut W, event: &DispatchEvent) {
    let Some(line) = event.console_line() else {
        return;
    };
    if let Err(err) = writeln!(out, "{line}") {
        warn!(error = %err, "console_write_failed");
    }
}
