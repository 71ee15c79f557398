//! Shared error type for LockLab operations.
//!
//! Structured variants for the failures the synchronization scenarios can
//! surface. Two conditions are deliberately *not* errors: an insufficient
//! balance is a reported withdraw outcome, and a lost counter update is the
//! documented result of the unsynchronized increment path. Deadlock is a
//! liveness failure and only ever surfaces as a harness-side timeout.

use thiserror::Error;

/// Primary error type for LockLab operations.
#[derive(Error, Debug)]
pub enum LockLabError {
    /// Withdraw or transfer amount was not strictly positive. Rejected
    /// before any lock is taken.
    #[error("invalid amount: {amount} (must be positive)")]
    InvalidAmount { amount: i64 },

    /// Source and destination of a transfer are the same account. Rejected
    /// before any lock is taken: double-acquiring one non-reentrant guard is
    /// a different artifact than the two-account circular wait.
    #[error("cannot transfer within a single account (account {account})")]
    SelfTransfer { account: u64 },

    /// A fallible singleton constructor failed. The cell stays
    /// uninitialized and a later caller may retry.
    #[error("lazy initialization failed: {detail}")]
    InitializationFailed { detail: String },

    /// A harness worker thread panicked before reporting its result.
    #[error("worker thread panicked: {detail}")]
    WorkerPanicked { detail: String },

    /// The OS refused to spawn a harness worker thread.
    #[error("failed to spawn worker thread '{name}'")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, LockLabError>;

#[cfg(test)]
mod tests {
    use super::LockLabError;

    #[test]
    fn display_strings_are_stable() {
        let err = LockLabError::InvalidAmount { amount: -5 };
        assert_eq!(err.to_string(), "invalid amount: -5 (must be positive)");

        let err = LockLabError::SelfTransfer { account: 7 };
        assert_eq!(
            err.to_string(),
            "cannot transfer within a single account (account 7)"
        );
    }

    #[test]
    fn spawn_error_preserves_source() {
        use std::error::Error as _;

        let err = LockLabError::Spawn {
            name: "watchdog-deadlock".to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::WouldBlock),
        };
        assert!(err.source().is_some());
    }
}
