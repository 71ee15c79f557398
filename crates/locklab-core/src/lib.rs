//! Synchronization building blocks and their composition patterns.
//!
//! This crate is intentionally small: it defines four primitives that each
//! isolate one coordination concern, including two that are *deliberately*
//! hazardous and kept that way as exhibits:
//!
//! - [`Lazy`]: exactly-once lazy initialization via double-checked locking.
//! - [`Account`]: a balance bound to its own exclusive guard; withdrawals
//!   serialize through the guard. [`UnguardedAccount`] is the racy variant
//!   that double-spends under concurrency.
//! - [`TransferCoordinator`]: a two-account transfer that acquires both
//!   guards in source-then-destination order and therefore deadlocks under
//!   opposite-order concurrent calls. `transfer_ordered` is the corrected
//!   variant.
//! - [`RacyCounter`]: an unsynchronized read-modify-write counter that loses
//!   updates. [`FetchAddCounter`] is the corrected variant.
//!
//! The deadlock and the lost updates are the subject matter, not defects;
//! callers that need liveness detection wrap these in an external watchdog.

pub mod account;
pub mod counter;
pub mod lazy;
pub mod transfer;

pub use account::{
    Account, AccountId, UnguardedAccount, WithdrawOutcome, WITHDRAW_HOLD_LATENCY,
};
pub use counter::{FetchAddCounter, RacyCounter};
pub use lazy::Lazy;
pub use transfer::{TransferCoordinator, TransferReceipt, TRANSFER_HOLD_LATENCY};
