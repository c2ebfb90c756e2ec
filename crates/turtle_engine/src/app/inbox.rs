use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

static INBOX_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_inbox_lock_poison_once(operation: &'static str) {
    if INBOX_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "command inbox lock poisoned; recovered inner value");
    }
}

/// Shared FIFO of raw command lines. Any number of [`CommandSender`]s may
/// push from any thread; only the dispatcher pops.
#[derive(Debug, Default)]
pub(crate) struct CommandInbox {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl CommandInbox {
    pub(crate) fn sender(&self) -> CommandSender {
        CommandSender {
            lines: Arc::clone(&self.lines),
        }
    }

    pub(crate) fn pop_front(&self) -> Option<String> {
        lock_lines(&self.lines, "pop").pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        lock_lines(&self.lines, "len").len()
    }
}

#[derive(Debug, Clone)]
pub struct CommandSender {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl CommandSender {
    /// Appends a command line. Empty or whitespace-only lines are dropped.
    pub fn submit(&self, line: impl Into<String>) -> bool {
        let line = line.into();
        if line.trim().is_empty() {
            return false;
        }
        lock_lines(&self.lines, "submit").push_back(line);
        true
    }
}

fn lock_lines<'a>(
    lines: &'a Mutex<VecDeque<String>>,
    operation: &'static str,
) -> MutexGuard<'a, VecDeque<String>> {
    match lines.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn_inbox_lock_poison_once(operation);
            poisoned.into_inner()
        }
    }
}
