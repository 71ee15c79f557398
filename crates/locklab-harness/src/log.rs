//! Tracing setup for the runner binary and the test suites.

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber with `RUST_LOG` filtering (default `info`).
///
/// Idempotent: later calls are no-ops, so tests can call it freely. Library
/// crates never install a subscriber themselves.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
