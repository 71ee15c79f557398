//! The four scenario drivers.
//!
//! Each driver spawns concurrent workers against one `locklab-core`
//! primitive, waits for them (or for a deadline, in the deadlock case), and
//! returns a serializable report of the final state. The reports carry the
//! raw observations; asserting the properties over them is the caller's
//! job (the test suites and the runner binary both do).

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use locklab_core::{Account, Lazy, RacyCounter, TransferCoordinator, WithdrawOutcome};
use locklab_error::{LockLabError, Result};

use crate::watchdog::run_with_deadline;

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}

fn join_worker<T>(handle: thread::ScopedJoinHandle<'_, T>) -> Result<T> {
    handle.join().map_err(|payload| LockLabError::WorkerPanicked {
        detail: panic_detail(payload.as_ref()),
    })
}

// ---------------------------------------------------------------------------
// Singleton scenario
// ---------------------------------------------------------------------------

/// What N concurrent first-accessors observed of one lazy cell.
#[derive(Debug, Clone, Serialize)]
pub struct SingletonReport {
    /// Number of concurrent accessors spawned.
    pub observers: usize,
    /// Number of distinct addresses observed across all accessors.
    /// Exactly 1 when the singleton contract holds.
    pub distinct_addresses: usize,
    /// How many times the constructor ran. Exactly 1 when the contract
    /// holds.
    pub constructions: usize,
}

impl SingletonReport {
    /// Whether the exactly-once contract held.
    #[must_use]
    pub fn holds(&self) -> bool {
        self.distinct_addresses == 1 && self.constructions == 1
    }
}

/// Race `concurrency` threads through first access of a fresh lazy cell.
///
/// # Errors
///
/// Returns [`LockLabError::WorkerPanicked`] if an accessor thread panics.
pub fn run_singleton_scenario(concurrency: usize) -> Result<SingletonReport> {
    let concurrency = concurrency.max(1);
    let constructions = AtomicUsize::new(0);
    let cell: Lazy<u64> = Lazy::new();

    let mut addresses = thread::scope(|s| -> Result<Vec<usize>> {
        let handles: Vec<_> = (0..concurrency)
            .map(|_| {
                s.spawn(|| {
                    let value = cell.get_or_init(|| {
                        constructions.fetch_add(1, Ordering::Relaxed);
                        0xC0FF_EE
                    });
                    std::ptr::from_ref(value) as usize
                })
            })
            .collect();

        let mut addresses = Vec::with_capacity(concurrency);
        for handle in handles {
            addresses.push(join_worker(handle)?);
        }
        Ok(addresses)
    })?;

    addresses.sort_unstable();
    addresses.dedup();

    let report = SingletonReport {
        observers: concurrency,
        distinct_addresses: addresses.len(),
        constructions: constructions.load(Ordering::Relaxed),
    };
    info!(
        observers = report.observers,
        distinct_addresses = report.distinct_addresses,
        constructions = report.constructions,
        "singleton scenario finished"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Guarded withdraw scenario
// ---------------------------------------------------------------------------

/// Final state after a batch of concurrent guarded withdrawals.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawReport {
    pub initial_balance: i64,
    pub final_balance: i64,
    /// Amounts admitted by the serialization the guard imposed.
    pub succeeded: Vec<i64>,
    /// Amounts refused for insufficient funds.
    pub rejected: Vec<i64>,
}

impl WithdrawReport {
    /// Whether the final balance accounts exactly for the admitted subset
    /// and never went negative.
    #[must_use]
    pub fn holds(&self) -> bool {
        let withdrawn: i64 = self.succeeded.iter().sum();
        self.final_balance == self.initial_balance - withdrawn && self.final_balance >= 0
    }
}

/// Run all `amounts` as concurrent withdrawals against one fresh account.
///
/// # Errors
///
/// Returns [`LockLabError::InvalidAmount`] if any amount is non-positive,
/// or [`LockLabError::WorkerPanicked`] if a withdraw thread panics.
pub fn run_guarded_withdraw_scenario(
    initial_balance: i64,
    amounts: &[i64],
) -> Result<WithdrawReport> {
    let account = Account::new(initial_balance);

    let outcomes = thread::scope(|s| -> Result<Vec<WithdrawOutcome>> {
        let account = &account;
        let handles: Vec<_> = amounts
            .iter()
            .map(|&amount| s.spawn(move || account.withdraw(amount)))
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(join_worker(handle)??);
        }
        Ok(outcomes)
    })?;

    let mut succeeded = Vec::new();
    let mut rejected = Vec::new();
    for outcome in outcomes {
        match outcome {
            WithdrawOutcome::Withdrawn { amount, .. } => succeeded.push(amount),
            WithdrawOutcome::InsufficientFunds { requested, .. } => rejected.push(requested),
        }
    }

    let report = WithdrawReport {
        initial_balance,
        final_balance: account.balance(),
        succeeded,
        rejected,
    };
    info!(
        initial_balance,
        final_balance = report.final_balance,
        admitted = report.succeeded.len(),
        refused = report.rejected.len(),
        "guarded withdraw scenario finished"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Deadlock scenario
// ---------------------------------------------------------------------------

/// Whether the circular-transfer setup completed inside the deadline.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeadlockReport {
    /// `false` is the expected outcome: the opposite-order transfers form a
    /// circular wait and never finish.
    pub completed: bool,
    pub timeout_ms: u64,
}

/// Drive two opposite-direction transfers through the deadlock-prone
/// coordinator and wait `timeout` for them.
///
/// The pair of workers (plus the watchdog worker supervising them) is
/// leaked when the deadline fires; the scenario cannot be unwound.
///
/// # Errors
///
/// Returns [`LockLabError::Spawn`] if the watchdog worker cannot be
/// spawned.
pub fn run_deadlock_scenario(timeout: Duration) -> Result<DeadlockReport> {
    let outcome = run_with_deadline("deadlock", timeout, || {
        let coordinator = TransferCoordinator::new();
        let account_a = Arc::new(Account::new(1_000));
        let account_b = Arc::new(Account::new(1_000));
        debug!(
            a = %account_a.id(),
            b = %account_b.id(),
            "starting opposite-direction transfers"
        );

        let t1 = {
            let (a, b) = (Arc::clone(&account_a), Arc::clone(&account_b));
            thread::spawn(move || coordinator.transfer(&a, &b, 100))
        };
        let t2 = {
            let (a, b) = (Arc::clone(&account_a), Arc::clone(&account_b));
            thread::spawn(move || coordinator.transfer(&b, &a, 200))
        };

        // Validation cannot fail here (positive amounts, distinct
        // accounts); the interesting outcome is liveness, observed by the
        // watchdog.
        let _ = t1.join();
        let _ = t2.join();
    })?;

    let report = DeadlockReport {
        completed: outcome.completed(),
        timeout_ms: timeout.as_millis() as u64,
    };
    info!(
        completed = report.completed,
        timeout_ms = report.timeout_ms,
        "deadlock scenario finished"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Race scenario
// ---------------------------------------------------------------------------

/// Final count after unsynchronized concurrent increments.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RaceReport {
    pub workers: usize,
    /// Total increments issued.
    pub expected: u64,
    /// Final counter value. Never exceeds `expected`; usually below it.
    pub observed: u64,
    /// Updates overwritten by the race.
    pub lost_updates: u64,
}

/// Split `total_increments` across `workers` threads hammering one racy
/// counter.
///
/// # Errors
///
/// Returns [`LockLabError::WorkerPanicked`] if a worker thread panics.
pub fn run_race_scenario(total_increments: usize, workers: usize) -> Result<RaceReport> {
    let workers = workers.max(1);
    let counter = RacyCounter::new();

    thread::scope(|s| -> Result<()> {
        let counter = &counter;
        let per_worker = total_increments / workers;
        let remainder = total_increments % workers;

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                // The first `remainder` workers take one extra increment.
                let quota = per_worker + usize::from(worker < remainder);
                s.spawn(move || {
                    for _ in 0..quota {
                        counter.increment();
                    }
                })
            })
            .collect();

        for handle in handles {
            join_worker(handle)?;
        }
        Ok(())
    })?;

    let observed = counter.get();
    let expected = total_increments as u64;
    let report = RaceReport {
        workers,
        expected,
        observed,
        lost_updates: expected.saturating_sub(observed),
    };
    info!(
        workers = report.workers,
        expected = report.expected,
        observed = report.observed,
        lost_updates = report.lost_updates,
        "race scenario finished"
    );
    Ok(report)
}
