//! Shared counters: one that loses updates, one that does not.
//!
//! [`RacyCounter`] is the anti-pattern exhibit: its increment is a split
//! load / store with nothing ordering the two, so concurrent increments
//! overwrite each other. K concurrent increments yield a final value ≤ K,
//! and strictly less than K with high probability once K is large. The
//! value lives in an atomic cell purely to keep the exhibit free of
//! undefined behavior; the read-modify-write itself is unsynchronized.
//!
//! [`FetchAddCounter`] is the clearly separate corrected variant for
//! comparison.

use std::sync::atomic::{AtomicU64, Ordering};

/// A shared counter whose increment is an unsynchronized read-modify-write.
///
/// Lost updates are the documented outcome, not an error: there is no
/// access discipline here by design.
#[derive(Debug, Default)]
pub struct RacyCounter {
    value: AtomicU64,
}

impl RacyCounter {
    /// Counter starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Increment with no synchronization: independent load and store.
    /// Concurrent callers can read the same value and overwrite each
    /// other's write.
    pub fn increment(&self) {
        let current = self.value.load(Ordering::Relaxed);
        self.value.store(current + 1, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// The correctly synchronized comparison variant: a single atomic
/// read-modify-write per increment, so no update is ever lost.
#[derive(Debug, Default)]
pub struct FetchAddCounter {
    value: AtomicU64,
}

impl FetchAddCounter {
    /// Counter starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Atomic increment.
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}
