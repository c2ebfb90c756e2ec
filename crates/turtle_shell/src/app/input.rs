use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};
use turtle_engine::CommandSender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InputSource {
    Stdin,
    Script(PathBuf),
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => write!(f, "stdin"),
            Self::Script(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Handle to the background thread that feeds input lines to the dispatcher.
pub(crate) struct InputPump {
    finished: Arc<AtomicBool>,
}

impl InputPump {
    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

pub(crate) fn spawn_input_pump(
    source: InputSource,
    sender: CommandSender,
) -> io::Result<InputPump> {
    let finished = Arc::new(AtomicBool::new(false));
    let finished_for_thread = Arc::clone(&finished);
    let reader = open_source(&source)?;

    thread::Builder::new()
        .name("command-input".to_string())
        .spawn(move || {
            match pump_lines(reader, &sender) {
                Ok(submitted) => info!(source = %source, submitted, "input_exhausted"),
                Err(error) => warn!(source = %source, error = %error, "input_read_failed"),
            }
            finished_for_thread.store(true, Ordering::Release);
        })?;

    Ok(InputPump { finished })
}

fn open_source(source: &InputSource) -> io::Result<Box<dyn BufRead + Send>> {
    match source {
        InputSource::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
        InputSource::Script(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
    }
}

/// Compacts each line and submits the non-empty ones. Returns how many lines
/// were submitted.
pub(crate) fn pump_lines<R: BufRead>(reader: R, sender: &CommandSender) -> io::Result<usize> {
    let mut submitted = 0usize;
    for line in reader.lines() {
        let line = line?;
        let Some(command) = compact_command(&line) else {
            continue;
        };
        debug!(command = command.as_str(), "command_submitted");
        if sender.submit(command) {
            submitted = submitted.saturating_add(1);
        }
    }
    Ok(submitted)
}

/// Strips every whitespace character so `A . fd ( 5 )` and `A.fd(5)` are the
/// same command.
pub(crate) fn compact_command(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
    if compact.is_empty() {
        None
    } else {
        Some(compact)
    }
}
