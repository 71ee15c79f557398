//! Two-account transfers over nested guard acquisition.
//!
//! [`TransferCoordinator::transfer`] acquires the source guard, holds it
//! across a simulated work delay, then acquires the destination guard. Two
//! concurrent transfers between the same accounts in opposite directions
//! therefore form a circular wait and hang indefinitely. That deadlock is
//! the component's defining edge case and is preserved on purpose: the
//! coordinator performs no timeout and no lock-ordering protocol, and
//! liveness detection belongs to an external watchdog.
//!
//! [`TransferCoordinator::transfer_ordered`] is the documented corrected
//! variant: identical semantics, but both guards are acquired in
//! [`AccountId`] order, which removes the circular wait. It sits alongside
//! the base coordinator rather than replacing it.
//!
//! Per-transfer state machine, traced at `debug` level:
//! pending → holding_from → holding_both → committed → released. Under the
//! deadlock condition `holding_from` persists forever.

use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use locklab_error::{LockLabError, Result};

use crate::account::{validate_amount, Account, AccountId};

/// Work simulated while holding the source guard, before the destination
/// guard is requested. Widens the deadlock window enough to make the
/// circular wait reproducible on demand.
pub const TRANSFER_HOLD_LATENCY: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// TransferReceipt
// ---------------------------------------------------------------------------

/// Balances observed at commit time, while both guards were held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: i64,
    /// Source balance after the debit.
    pub from_balance: i64,
    /// Destination balance after the credit.
    pub to_balance: i64,
}

// ---------------------------------------------------------------------------
// TransferCoordinator
// ---------------------------------------------------------------------------

/// Moves an amount between two accounts, atomically with respect to every
/// other operation touching either account's guard.
///
/// Transfers do not check the source balance; overdraft is permitted and
/// the source balance may go negative.
#[derive(Debug, Clone, Copy)]
pub struct TransferCoordinator {
    hold_latency: Duration,
}

impl Default for TransferCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferCoordinator {
    /// Coordinator with the default mid-transfer hold latency.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hold_latency: TRANSFER_HOLD_LATENCY,
        }
    }

    /// Coordinator with a caller-chosen hold latency. Tests shrink it to
    /// keep non-deadlock scenarios fast.
    #[must_use]
    pub const fn with_hold_latency(hold_latency: Duration) -> Self {
        Self { hold_latency }
    }

    fn validate(from: &Account, to: &Account, amount: i64) -> Result<()> {
        validate_amount(amount)?;
        if from.id() == to.id() {
            return Err(LockLabError::SelfTransfer {
                account: from.id().get(),
            });
        }
        Ok(())
    }

    /// Transfer `amount` from `from` to `to`, acquiring guards in
    /// source-then-destination order.
    ///
    /// Deadlocks when run concurrently with the opposite-direction transfer
    /// on the same pair of accounts; see the module docs.
    ///
    /// # Errors
    ///
    /// Returns [`LockLabError::InvalidAmount`] or
    /// [`LockLabError::SelfTransfer`], both rejected before any guard is
    /// taken.
    pub fn transfer(&self, from: &Account, to: &Account, amount: i64) -> Result<TransferReceipt> {
        Self::validate(from, to, amount)?;
        debug!(from = %from.id(), to = %to.id(), amount, "transfer pending");

        let mut from_balance = from.lock_balance();
        debug!(from = %from.id(), "transfer holding_from");

        // Simulated work while holding the source guard. The opposite-order
        // peer acquires its own source guard inside this window.
        thread::sleep(self.hold_latency);

        let mut to_balance = to.lock_balance();
        debug!(from = %from.id(), to = %to.id(), "transfer holding_both");

        *from_balance -= amount;
        *to_balance += amount;
        let receipt = TransferReceipt {
            from: from.id(),
            to: to.id(),
            amount,
            from_balance: *from_balance,
            to_balance: *to_balance,
        };
        info!(
            from = %from.id(),
            to = %to.id(),
            amount,
            from_balance = *from_balance,
            to_balance = *to_balance,
            "transfer committed"
        );

        drop(to_balance);
        drop(from_balance);
        debug!(from = %from.id(), to = %to.id(), "transfer released");
        Ok(receipt)
    }

    /// Transfer `amount` from `from` to `to`, acquiring guards in
    /// [`AccountId`] order regardless of transfer direction.
    ///
    /// The total order on guard acquisition makes the circular wait
    /// impossible: two opposite-direction transfers contend on the same
    /// first guard instead of each other's second.
    ///
    /// # Errors
    ///
    /// Same validation as [`transfer`](Self::transfer).
    pub fn transfer_ordered(
        &self,
        from: &Account,
        to: &Account,
        amount: i64,
    ) -> Result<TransferReceipt> {
        Self::validate(from, to, amount)?;
        debug!(from = %from.id(), to = %to.id(), amount, "ordered transfer pending");

        let (mut from_balance, mut to_balance) = if from.id() < to.id() {
            let f = from.lock_balance();
            thread::sleep(self.hold_latency);
            let t = to.lock_balance();
            (f, t)
        } else {
            let t = to.lock_balance();
            thread::sleep(self.hold_latency);
            let f = from.lock_balance();
            (f, t)
        };
        debug!(from = %from.id(), to = %to.id(), "ordered transfer holding_both");

        *from_balance -= amount;
        *to_balance += amount;
        let receipt = TransferReceipt {
            from: from.id(),
            to: to.id(),
            amount,
            from_balance: *from_balance,
            to_balance: *to_balance,
        };
        info!(
            from = %from.id(),
            to = %to.id(),
            amount,
            "ordered transfer committed"
        );
        Ok(receipt)
    }
}
