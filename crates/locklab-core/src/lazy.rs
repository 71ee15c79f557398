//! Exactly-once lazy initialization via double-checked locking.
//!
//! [`Lazy<T>`] guarantees that across any number of concurrent first
//! accessors the value is constructed exactly once and that every accessor
//! observes the same, fully constructed value. The fast path is a single
//! `Acquire` load with no lock; the slow path serializes constructors
//! through a dedicated initialization mutex and re-checks under it.
//!
//! Publication invariant: the pointer is stored with `Release` ordering
//! *after* construction completes, pairing with the fast path's `Acquire`
//! load, so no reader can observe a partially constructed value.
//!
//! The standard library's `OnceLock` offers the same contract; the
//! double-check idiom is implemented explicitly here because the idiom
//! itself is what this crate demonstrates.

use std::convert::Infallible;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use parking_lot::Mutex;
use tracing::debug;

/// A cell that is initialized at most once, safely under concurrent first
/// access.
///
/// State transitions exactly once, uninitialized → initialized, and never
/// reverts. `const`-constructible, so it can back process-wide statics.
pub struct Lazy<T> {
    /// Null until the value is published; once non-null, never changes.
    value: AtomicPtr<T>,
    /// Dedicated initialization lock. Used for nothing else, so lock
    /// ordering in unrelated code cannot entangle initialization.
    init_lock: Mutex<()>,
}

// The cell hands out `&T` to concurrent callers and moves `T` in from the
// initializing thread, hence the `Send + Sync` bound for sharing.
unsafe impl<T: Send> Send for Lazy<T> {}
unsafe impl<T: Send + Sync> Sync for Lazy<T> {}

impl<T> Lazy<T> {
    /// Create an uninitialized cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicPtr::new(ptr::null_mut()),
            init_lock: Mutex::new(()),
        }
    }

    /// Fast-path read: the current value, if already initialized. Never
    /// takes a lock.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        let ptr = self.value.load(Ordering::Acquire);
        if ptr.is_null() {
            None
        } else {
            // Non-null means the Release store in `try_init_slow` happened,
            // so the pointee is fully constructed.
            Some(unsafe { &*ptr })
        }
    }

    /// Whether the cell has been initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !self.value.load(Ordering::Acquire).is_null()
    }

    /// Return the value, constructing it with `init` if this is the first
    /// access. At most one caller's `init` runs, no matter how many race.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        match self.get_or_try_init::<_, Infallible>(|| Ok(init())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`get_or_init`](Self::get_or_init).
    ///
    /// # Errors
    ///
    /// Returns `init`'s error unchanged. On error the initialization lock is
    /// released by scope and the cell remains uninitialized, so a later
    /// caller may retry.
    pub fn get_or_try_init<F, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        // Fast path: no lock on the common already-initialized case.
        if let Some(value) = self.get() {
            return Ok(value);
        }
        self.try_init_slow(init)
    }

    #[cold]
    fn try_init_slow<F, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let _guard = self.init_lock.lock();

        // Re-check: another thread may have initialized while we waited on
        // the lock.
        if let Some(value) = self.get() {
            return Ok(value);
        }

        let raw = Box::into_raw(Box::new(init()?));
        // Release pairs with the Acquire in `get`: the store is ordered
        // after construction, so fast-path readers never see a partial
        // value.
        self.value.store(raw, Ordering::Release);
        debug!(addr = raw as usize, "lazy value constructed and published");
        Ok(unsafe { &*raw })
    }
}

impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("Lazy").field(value).finish(),
            None => f.write_str("Lazy(<uninitialized>)"),
        }
    }
}

impl<T> Drop for Lazy<T> {
    fn drop(&mut self) {
        let ptr = *self.value.get_mut();
        if !ptr.is_null() {
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::Lazy;

    #[test]
    fn uninitialized_cell_reads_none() {
        let cell: Lazy<u32> = Lazy::new();
        assert!(cell.get().is_none());
        assert!(!cell.is_initialized());
    }

    #[test]
    fn constructs_exactly_once_under_contention() {
        const ACCESSORS: usize = 32;

        let constructions = AtomicUsize::new(0);
        let cell: Lazy<u64> = Lazy::new();

        let addresses: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..ACCESSORS)
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
            handles
                .into_iter()
                .map(|h| h.join().expect("accessor thread panicked"))
                .collect()
        });

        assert_eq!(constructions.load(Ordering::Relaxed), 1);
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cell.get().copied(), Some(0xC0FF_EE));
    }

    #[test]
    fn failed_construction_leaves_cell_uninitialized_and_retryable() {
        use locklab_error::LockLabError;

        let cell: Lazy<String> = Lazy::new();

        let result = cell.get_or_try_init(|| {
            Err::<String, _>(LockLabError::InitializationFailed {
                detail: "constructor fault".to_owned(),
            })
        });
        assert!(matches!(
            result.unwrap_err(),
            LockLabError::InitializationFailed { .. }
        ));
        assert!(!cell.is_initialized());

        // The init lock was released by scope, so a retry succeeds.
        let value = cell
            .get_or_try_init(|| Ok::<_, LockLabError>("recovered".to_owned()))
            .expect("retry after failed init");
        assert_eq!(value, "recovered");
    }

    #[test]
    fn usable_as_a_process_wide_static() {
        static INSTANCE: Lazy<Vec<u8>> = Lazy::new();

        let first = INSTANCE.get_or_init(|| vec![1, 2, 3]);
        let second = INSTANCE.get_or_init(|| unreachable!("already initialized"));
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn drop_frees_the_value() {
        struct Canary<'a>(&'a AtomicUsize);
        impl Drop for Canary<'_> {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let drops = AtomicUsize::new(0);
        {
            let cell: Lazy<Canary<'_>> = Lazy::new();
            cell.get_or_init(|| Canary(&drops));
        }
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }
}
