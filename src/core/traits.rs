//! Core traits for the wallet's storage and boundary seams
//!
//! The transfer engine only talks to storage through these traits, receiving
//! concrete implementations at construction time.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use super::ledger::{Cursor, TransactionPage};
use super::notification::TransactionCreated;
use super::unit_of_work::UnitOfWork;
use crate::types::{Account, AccountId, Amount, Transaction, TransactionId, TransferError};

/// Trait for account balance storage
///
/// Writes only happen inside a [`UnitOfWork`]; the store never applies a
/// balance change outside of a commit.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Exclusively lock every requested account for the lifetime of `uow`
    ///
    /// Locks are acquired in ascending id order whatever order `ids` is given
    /// in, and the call only returns once all of them are held. Returns the
    /// locked rows keyed by id.
    async fn lock_for_update(
        &self,
        uow: &mut UnitOfWork,
        ids: &[AccountId],
    ) -> Result<BTreeMap<AccountId, Account>, TransferError>;

    /// Stage a mutated account; applied when `uow` commits
    fn save(&self, uow: &mut UnitOfWork, account: Account) -> Result<(), TransferError>;

    /// Current committed balance
    async fn balance(&self, id: AccountId) -> Option<Amount>;

    /// All accounts, sorted by id
    async fn snapshot(&self) -> Vec<Account>;
}

/// Trait for the append-only transaction ledger
pub trait TransactionLedger: Send + Sync {
    /// Record a transaction as part of `uow`
    ///
    /// The record becomes visible to readers only when `uow` commits.
    fn create(
        &self,
        uow: &mut UnitOfWork,
        record: Transaction,
    ) -> Result<Transaction, TransferError>;

    /// Transactions where `account` is sender or receiver, newest first
    ///
    /// A `limit` of 0 asks for the default page size; implementations may cap
    /// larger limits.
    fn list_for_participant(
        &self,
        account: AccountId,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> TransactionPage;

    /// Look up one committed record
    fn get(&self, id: TransactionId) -> Option<Transaction>;

    /// Number of committed records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trait for the idempotency reservation store
pub trait DeduplicationStore: Send + Sync {
    /// Atomically insert `key` if absent (or expired)
    ///
    /// Returns `true` when this caller acquired the reservation.
    fn reserve(&self, key: &str, ttl: Duration) -> bool;

    /// Drop a reservation so the key can be used again
    fn release(&self, key: &str);
}

/// Trait for delivering "transaction created" events to participants
pub trait NotificationSink: Send + Sync {
    fn publish(&self, channel: &str, event: &TransactionCreated) -> Result<(), TransferError>;
}
