//! Thread-safe account storage with row-level exclusive locks
//!
//! This module provides the `InMemoryAccountStore` struct, which keeps account
//! balances in a concurrent map of individually lockable rows.
//!
//! # Design
//!
//! The store uses `DashMap` to map account ids to `Arc<tokio::sync::Mutex<Account>>`
//! rows. The map shard lock is only held long enough to clone a row's `Arc`;
//! the row mutex is the actual account lock, and its owned guard can live inside
//! a `UnitOfWork` for as long as the transfer needs it.
//!
//! # Lock Ordering
//!
//! `lock_for_update` sorts and deduplicates the requested ids and acquires the
//! row locks strictly in ascending order. Two transfers between the same pair
//! of accounts, in either direction, therefore always lock in the same order
//! and can never wait on each other in a cycle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::traits::AccountStore;
use super::unit_of_work::UnitOfWork;
use crate::types::{Account, AccountId, Amount, TransferError};

type Row = Arc<Mutex<Account>>;

/// Thread-safe account store
///
/// Operations on different accounts proceed in parallel; a transfer holding
/// an account's lock blocks every other writer and reader of that account
/// until its unit of work finishes.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    /// Account rows by id
    accounts: DashMap<AccountId, Row>,

    /// Upper bound on waiting for the full set of locks
    lock_timeout: Option<Duration>,
}

impl InMemoryAccountStore {
    /// Create an empty store that waits indefinitely for locks
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that gives up on lock acquisition after `timeout`
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self {
            accounts: DashMap::new(),
            lock_timeout: Some(timeout),
        }
    }

    /// Open an account with an opening balance
    ///
    /// Fails with `DuplicateAccount` if the id is already taken.
    pub fn open_account(&self, id: AccountId, balance: Amount) -> Result<(), TransferError> {
        use dashmap::mapref::entry::Entry;

        match self.accounts.entry(id) {
            Entry::Occupied(_) => Err(TransferError::DuplicateAccount { account: id }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(Account::with_balance(id, balance))));
                Ok(())
            }
        }
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn row(&self, id: AccountId) -> Option<Row> {
        self.accounts.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    async fn acquire(&self, uow: &mut UnitOfWork, ordered: Vec<(AccountId, Row)>) {
        for (id, row) in ordered {
            let guard = row.lock_owned().await;
            debug!(unit = uow.id(), account = id, "account locked");
            uow.hold(guard);
        }
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn lock_for_update(
        &self,
        uow: &mut UnitOfWork,
        ids: &[AccountId],
    ) -> Result<BTreeMap<AccountId, Account>, TransferError> {
        let mut ordered: Vec<AccountId> = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        // Resolve every row before taking any lock so a missing account
        // aborts without blocking anyone.
        let rows = ordered
            .iter()
            .filter(|id| !uow.is_locked(**id))
            .map(|&id| {
                self.row(id)
                    .map(|row| (id, row))
                    .ok_or_else(|| TransferError::account_not_found(id))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match self.lock_timeout {
            Some(timeout) => {
                if tokio::time::timeout(timeout, self.acquire(uow, rows))
                    .await
                    .is_err()
                {
                    warn!(unit = uow.id(), accounts = ?ordered, ?timeout, "account lock timed out");
                    return Err(TransferError::storage(format!(
                        "timed out after {}ms waiting for account locks",
                        timeout.as_millis()
                    )));
                }
            }
            None => self.acquire(uow, rows).await,
        }

        Ok(ordered
            .iter()
            .filter_map(|id| uow.locked(*id).map(|account| (*id, account.clone())))
            .collect())
    }

    fn save(&self, uow: &mut UnitOfWork, account: Account) -> Result<(), TransferError> {
        if !self.contains(account.id) {
            return Err(TransferError::account_not_found(account.id));
        }
        uow.stage_account(account)
    }

    async fn balance(&self, id: AccountId) -> Option<Amount> {
        let row = self.row(id)?;
        let account = row.lock().await;
        Some(account.balance)
    }

    async fn snapshot(&self) -> Vec<Account> {
        let mut rows: Vec<(AccountId, Row)> = self
            .accounts
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        rows.sort_unstable_by_key(|(id, _)| *id);

        let mut accounts = Vec::with_capacity(rows.len());
        for (_, row) in rows {
            accounts.push(row.lock().await.clone());
        }
        accounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(units: i64) -> Amount {
        Amount::from_minor_units(units)
    }

    fn store_with(accounts: &[(AccountId, i64)]) -> InMemoryAccountStore {
        let store = InMemoryAccountStore::new();
        for &(id, units) in accounts {
            store.open_account(id, amount(units)).unwrap();
        }
        store
    }

    #[test]
    fn test_open_account_rejects_duplicates() {
        let store = store_with(&[(1, 0)]);

        let result = store.open_account(1, amount(5));

        assert_eq!(result, Err(TransferError::DuplicateAccount { account: 1 }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_lock_for_update_returns_all_requested_rows() {
        let store = store_with(&[(1, 100), (2, 200)]);
        let mut uow = UnitOfWork::begin();

        let locked = store.lock_for_update(&mut uow, &[2, 1]).await.unwrap();

        assert_eq!(locked.len(), 2);
        assert_eq!(locked[&1].balance, amount(100));
        assert_eq!(locked[&2].balance, amount(200));
        assert_eq!(uow.locked_ids(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_lock_for_update_deduplicates_ids() {
        let store = store_with(&[(5, 0)]);
        let mut uow = UnitOfWork::begin();

        let locked = store.lock_for_update(&mut uow, &[5, 5]).await.unwrap();

        assert_eq!(locked.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_account_fails_without_locking() {
        let store = store_with(&[(1, 100)]);
        let mut uow = UnitOfWork::begin();

        let result = store.lock_for_update(&mut uow, &[1, 99]).await;

        assert_eq!(result, Err(TransferError::account_not_found(99)));
        assert!(uow.locked_ids().is_empty());
    }

    #[tokio::test]
    async fn test_locks_block_other_units_until_released() {
        let store = Arc::new(store_with(&[(1, 100), (2, 0)]));
        let mut first = UnitOfWork::begin();
        store.lock_for_update(&mut first, &[1, 2]).await.unwrap();

        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut second = UnitOfWork::begin();
                store.lock_for_update(&mut second, &[2, 1]).await.unwrap();
                second.rollback();
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        first.rollback();
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_timeout_is_a_storage_error() {
        let store = InMemoryAccountStore::with_lock_timeout(Duration::from_millis(10));
        store.open_account(1, amount(0)).unwrap();
        store.open_account(2, amount(0)).unwrap();

        let mut holder = UnitOfWork::begin();
        store.lock_for_update(&mut holder, &[2]).await.unwrap();

        let mut waiter = UnitOfWork::begin();
        let result = store.lock_for_update(&mut waiter, &[1, 2]).await;

        assert!(matches!(result, Err(TransferError::Storage { .. })));
        // the lock on 1 taken before the timeout belongs to the waiter until rollback
        waiter.rollback();
        holder.rollback();
        assert_eq!(store.balance(1).await, Some(amount(0)));
    }

    #[tokio::test]
    async fn test_save_stages_until_commit() {
        let store = store_with(&[(1, 100)]);
        let mut uow = UnitOfWork::begin();
        let mut account = store.lock_for_update(&mut uow, &[1]).await.unwrap()[&1].clone();

        account.balance = amount(40);
        store.save(&mut uow, account).unwrap();
        assert_eq!(uow.staged(1).unwrap().balance, amount(40));

        uow.commit();
        assert_eq!(store.balance(1).await, Some(amount(40)));
    }

    #[tokio::test]
    async fn test_save_unknown_account_fails() {
        let store = store_with(&[]);
        let mut uow = UnitOfWork::begin();

        let result = store.save(&mut uow, Account::new(3));

        assert_eq!(result, Err(TransferError::account_not_found(3)));
    }

    #[tokio::test]
    async fn test_snapshot_is_sorted_by_id() {
        let store = store_with(&[(3, 30), (1, 10), (2, 20)]);

        let ids: Vec<AccountId> = store.snapshot().await.iter().map(|a| a.id).collect();

        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.balance(4).await, None);
    }
}
