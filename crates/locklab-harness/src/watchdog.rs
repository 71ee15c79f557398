//! Wall-clock deadline around a worker that may never finish.
//!
//! The core coordinator performs no internal timeout and no deadlock
//! detection; an indefinite hang is its honest behavior. The watchdog is
//! the external detection mechanism: it runs the work on a detached named
//! thread and waits on a completion channel with a deadline, so a hang
//! becomes a [`WaitOutcome::TimedOut`] instead of a hung test run.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use locklab_error::{LockLabError, Result};

/// Result of waiting on a watchdog-supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    /// The worker finished inside the deadline.
    Completed,
    /// The deadline elapsed first. The worker thread is leaked: a
    /// deadlocked thread cannot be unwound from outside.
    TimedOut,
    /// The worker panicked before reporting completion.
    Panicked,
}

impl WaitOutcome {
    /// Whether the worker finished inside the deadline.
    #[must_use]
    pub const fn completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Run `f` on a detached thread named `watchdog-{name}` and wait up to
/// `timeout` for it to complete.
///
/// # Errors
///
/// Returns [`LockLabError::Spawn`] if the OS refuses the worker thread.
pub fn run_with_deadline<F>(name: &str, timeout: Duration, f: F) -> Result<WaitOutcome>
where
    F: FnOnce() + Send + 'static,
{
    let (done_tx, done_rx) = mpsc::channel::<()>();

    thread::Builder::new()
        .name(format!("watchdog-{name}"))
        .spawn(move || {
            f();
            // The receiver is gone if the deadline already fired; nothing
            // left to report to in that case.
            let _ = done_tx.send(());
        })
        .map_err(|source| LockLabError::Spawn {
            name: format!("watchdog-{name}"),
            source,
        })?;

    match done_rx.recv_timeout(timeout) {
        Ok(()) => {
            debug!(scenario = name, "worker completed within deadline");
            Ok(WaitOutcome::Completed)
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                scenario = name,
                timeout_ms = timeout.as_millis() as u64,
                "deadline elapsed; leaking the worker thread"
            );
            Ok(WaitOutcome::TimedOut)
        }
        Err(RecvTimeoutError::Disconnected) => {
            warn!(scenario = name, "worker panicked before completion");
            Ok(WaitOutcome::Panicked)
        }
    }
}
