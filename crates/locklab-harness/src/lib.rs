//! LockLab scenario harness.
//!
//! This crate is intentionally not "just tests": it contains the reusable
//! drivers that spawn concurrent workers against the `locklab-core`
//! primitives, the watchdog that turns liveness failures (the deadlock
//! scenario) into detectable timeouts, and the logging setup shared by the
//! runner binary and the test suites.

pub mod log;
pub mod scenario;
pub mod watchdog;

pub use scenario::{
    run_deadlock_scenario, run_guarded_withdraw_scenario, run_race_scenario,
    run_singleton_scenario, DeadlockReport, RaceReport, SingletonReport, WithdrawReport,
};
pub use watchdog::{run_with_deadline, WaitOutcome};
