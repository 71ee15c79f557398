//! Accounts whose balance is bound to its own exclusive guard.
//!
//! [`Account`] wraps the balance in its guard, so reading or writing the
//! balance without holding the guard is structurally impossible. The
//! mutual exclusion is scoped exactly to the data it protects, and the
//! guard must never be reused for unrelated state.
//!
//! [`UnguardedAccount`] is the deliberately racy exhibit: its withdraw
//! performs an unsynchronized read / check / write and double-spends under
//! concurrent calls. It demonstrates the hazard the guarded variant fixes
//! and is kept as-is.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{info, warn};

use locklab_error::{LockLabError, Result};

/// Processing latency simulated while a withdraw holds its guard. Models
/// the lock-hold-time cost of doing real work inside a critical section.
pub const WITHDRAW_HOLD_LATENCY: Duration = Duration::from_millis(1);

static NEXT_ACCOUNT_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Process-unique account identifier.
///
/// Allocated from a process-wide atomic counter, so identifiers are strictly
/// increasing. Their `Ord` supplies the total order that
/// [`TransferCoordinator::transfer_ordered`](crate::TransferCoordinator::transfer_ordered)
/// uses to break circular waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct AccountId(u64);

impl AccountId {
    fn next() -> Self {
        Self(NEXT_ACCOUNT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// WithdrawOutcome
// ---------------------------------------------------------------------------

/// Outcome of a withdraw call.
///
/// An insufficient balance is a recoverable no-op with a reported outcome,
/// not an error; only amount validation produces an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    /// The balance covered the amount and was debited.
    Withdrawn { amount: i64, remaining: i64 },
    /// The balance did not cover the amount; nothing was mutated.
    InsufficientFunds { available: i64, requested: i64 },
}

impl WithdrawOutcome {
    /// Whether the withdraw debited the account.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Withdrawn { .. })
    }
}

pub(crate) fn validate_amount(amount: i64) -> Result<()> {
    // Rejected before any lock is taken.
    if amount <= 0 {
        return Err(LockLabError::InvalidAmount { amount });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A mutable balance protected by its own exclusive guard.
///
/// All guarded operations against one account are totally ordered by guard
/// acquisition: concurrent withdrawals are indistinguishable from some
/// strict serial schedule, and the balance never goes negative through
/// `withdraw`.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    balance: Mutex<i64>,
}

impl Account {
    /// Create an account with the given initial balance.
    #[must_use]
    pub fn new(initial_balance: i64) -> Self {
        Self {
            id: AccountId::next(),
            balance: Mutex::new(initial_balance),
        }
    }

    /// This account's identifier.
    #[must_use]
    pub const fn id(&self) -> AccountId {
        self.id
    }

    /// Current balance. Takes the guard briefly.
    #[must_use]
    pub fn balance(&self) -> i64 {
        *self.balance.lock()
    }

    /// Non-blocking balance read: `None` if the guard is currently held.
    /// Lets callers verify the guard was released without risking a hang.
    #[must_use]
    pub fn try_balance(&self) -> Option<i64> {
        self.balance.try_lock().map(|guard| *guard)
    }

    /// Acquire this account's guard. Transfer coordination needs to hold
    /// two balances at once, which a single `withdraw`-style scope cannot
    /// express.
    pub(crate) fn lock_balance(&self) -> MutexGuard<'_, i64> {
        self.balance.lock()
    }

    /// Withdraw `amount` if the balance covers it.
    ///
    /// The guard is held across a simulated processing latency
    /// ([`WITHDRAW_HOLD_LATENCY`]) and released by scope on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`LockLabError::InvalidAmount`] for non-positive amounts,
    /// before the guard is taken.
    pub fn withdraw(&self, amount: i64) -> Result<WithdrawOutcome> {
        validate_amount(amount)?;

        let mut balance = self.balance.lock();
        if *balance >= amount {
            thread::sleep(WITHDRAW_HOLD_LATENCY);
            *balance -= amount;
            info!(account = %self.id, amount, remaining = *balance, "withdrawn");
            Ok(WithdrawOutcome::Withdrawn {
                amount,
                remaining: *balance,
            })
        } else {
            warn!(
                account = %self.id,
                available = *balance,
                requested = amount,
                "insufficient balance"
            );
            Ok(WithdrawOutcome::InsufficientFunds {
                available: *balance,
                requested: amount,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// UnguardedAccount
// ---------------------------------------------------------------------------

/// The racy withdraw variant: no guard, unsynchronized read-modify-write.
///
/// Two concurrent withdrawals can both read the same balance, both pass the
/// check, and both write back: a double spend. The balance lives in an
/// atomic cell so the exhibit stays free of undefined behavior, but the
/// load / check / store sequence is deliberately not atomic.
#[derive(Debug)]
pub struct UnguardedAccount {
    id: AccountId,
    balance: AtomicI64,
}

impl UnguardedAccount {
    /// Create an account with the given initial balance.
    #[must_use]
    pub fn new(initial_balance: i64) -> Self {
        Self {
            id: AccountId::next(),
            balance: AtomicI64::new(initial_balance),
        }
    }

    /// This account's identifier.
    #[must_use]
    pub const fn id(&self) -> AccountId {
        self.id
    }

    /// Current balance.
    #[must_use]
    pub fn balance(&self) -> i64 {
        self.balance.load(Ordering::Relaxed)
    }

    /// Withdraw `amount` with no mutual exclusion.
    ///
    /// # Errors
    ///
    /// Returns [`LockLabError::InvalidAmount`] for non-positive amounts.
    pub fn withdraw(&self, amount: i64) -> Result<WithdrawOutcome> {
        validate_amount(amount)?;

        let available = self.balance.load(Ordering::Relaxed);
        if available >= amount {
            thread::sleep(WITHDRAW_HOLD_LATENCY);
            // Lost-update window: another withdraw may have run since the
            // load above, and this store overwrites its result.
            let remaining = available - amount;
            self.balance.store(remaining, Ordering::Relaxed);
            info!(account = %self.id, amount, remaining, "withdrawn (unguarded)");
            Ok(WithdrawOutcome::Withdrawn { amount, remaining })
        } else {
            warn!(
                account = %self.id,
                available,
                requested = amount,
                "insufficient balance (unguarded)"
            );
            Ok(WithdrawOutcome::InsufficientFunds {
                available,
                requested: amount,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use proptest::prelude::*;

    use super::{Account, UnguardedAccount, WithdrawOutcome};
    use locklab_error::LockLabError;

    #[test]
    fn withdraw_debits_when_covered() {
        let account = Account::new(1_000);
        let outcome = account.withdraw(300).expect("valid amount");
        assert_eq!(
            outcome,
            WithdrawOutcome::Withdrawn {
                amount: 300,
                remaining: 700,
            }
        );
        assert_eq!(account.balance(), 700);
    }

    #[test]
    fn withdraw_is_a_noop_when_not_covered() {
        let account = Account::new(100);
        let outcome = account.withdraw(250).expect("valid amount");
        assert_eq!(
            outcome,
            WithdrawOutcome::InsufficientFunds {
                available: 100,
                requested: 250,
            }
        );
        assert_eq!(account.balance(), 100);
    }

    #[test]
    fn non_positive_amount_is_rejected_before_locking() {
        let account = Account::new(100);
        for amount in [0, -1, i64::MIN] {
            let err = account.withdraw(amount).unwrap_err();
            assert!(matches!(err, LockLabError::InvalidAmount { .. }));
        }
        // Balance untouched and guard free.
        assert_eq!(account.try_balance(), Some(100));
    }

    #[test]
    fn guard_is_released_after_every_outcome() {
        let account = Account::new(1_000);
        account.withdraw(400).expect("valid amount");
        assert!(account.try_balance().is_some());
        account.withdraw(5_000).expect("valid amount");
        assert!(account.try_balance().is_some());
    }

    #[test]
    fn concurrent_overdraw_admits_exactly_one() {
        let account = Account::new(1_000);

        let outcomes: Vec<WithdrawOutcome> = thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| s.spawn(|| account.withdraw(800).expect("valid amount")))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("withdraw thread panicked"))
                .collect()
        });

        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        assert_eq!(succeeded, 1, "the guard serializes the two withdrawals");
        assert_eq!(account.balance(), 200);
    }

    #[test]
    fn unguarded_withdraw_double_spends() {
        // Statistical: the built-in hold latency makes the interleaving all
        // but certain, but retry a few times to keep the test robust.
        for _ in 0..20 {
            let account = UnguardedAccount::new(1_000);
            let barrier = Barrier::new(2);

            let outcomes: Vec<WithdrawOutcome> = thread::scope(|s| {
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        s.spawn(|| {
                            barrier.wait();
                            account.withdraw(800).expect("valid amount")
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().expect("withdraw thread panicked"))
                    .collect()
            });

            let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
            if succeeded == 2 {
                // Both read 1000, both passed the check: 1600 withdrawn
                // from a 1000 balance.
                return;
            }
        }
        panic!("unguarded withdraw never raced in 20 attempts");
    }

    proptest! {
        // Serializability: whatever interleaving the scheduler picks, the
        // final balance accounts exactly for the subset of withdrawals that
        // succeeded, and never goes negative.
        #[test]
        fn concurrent_withdrawals_serialize(
            amounts in prop::collection::vec(1_i64..500, 1..10),
        ) {
            let initial = 1_000;
            let account = Account::new(initial);

            let outcomes: Vec<WithdrawOutcome> = thread::scope(|s| {
                let account = &account;
                let handles: Vec<_> = amounts
                    .iter()
                    .map(|&amount| {
                        s.spawn(move || account.withdraw(amount).expect("valid amount"))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().expect("withdraw thread panicked"))
                    .collect()
            });

            let withdrawn: i64 = outcomes
                .iter()
                .filter_map(|o| match o {
                    WithdrawOutcome::Withdrawn { amount, .. } => Some(*amount),
                    WithdrawOutcome::InsufficientFunds { .. } => None,
                })
                .sum();

            prop_assert_eq!(account.balance(), initial - withdrawn);
            prop_assert!(account.balance() >= 0);
        }
    }
}
