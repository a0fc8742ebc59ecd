//! Atomic unit of work for a single transfer
//!
//! A `UnitOfWork` owns everything a transfer has touched until it finishes:
//!
//! - the exclusive account locks taken by `AccountStore::lock_for_update`
//! - account writes staged by `AccountStore::save`
//! - ledger appends deferred by `TransactionLedger::create`
//!
//! Nothing staged is visible to other callers before [`UnitOfWork::commit`].
//! [`UnitOfWork::rollback`], or dropping an unfinished unit, discards all staged
//! effects and releases the locks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::types::{Account, AccountId, TransferError};

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

type DeferredEffect = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Open,
    Committed,
    RolledBack,
}

/// All-or-nothing scope for one transfer
pub struct UnitOfWork {
    id: u64,
    locks: BTreeMap<AccountId, OwnedMutexGuard<Account>>,
    staged: BTreeMap<AccountId, Account>,
    deferred: Vec<DeferredEffect>,
    state: UnitState,
}

impl UnitOfWork {
    /// Open a new unit of work
    pub fn begin() -> Self {
        let id = NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(unit = id, "unit of work opened");
        Self {
            id,
            locks: BTreeMap::new(),
            staged: BTreeMap::new(),
            deferred: Vec::new(),
            state: UnitState::Open,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this unit holds the lock on `account`
    pub fn is_locked(&self, account: AccountId) -> bool {
        self.locks.contains_key(&account)
    }

    /// Ids of every account locked by this unit, ascending
    pub fn locked_ids(&self) -> Vec<AccountId> {
        self.locks.keys().copied().collect()
    }

    /// Committed state of a locked account (ignores staged writes)
    pub fn locked(&self, account: AccountId) -> Option<&Account> {
        self.locks.get(&account).map(|guard| &**guard)
    }

    /// Staged state of an account, if `save` was called for it
    pub fn staged(&self, account: AccountId) -> Option<&Account> {
        self.staged.get(&account)
    }

    /// Take ownership of an account lock until the unit finishes
    pub fn hold(&mut self, guard: OwnedMutexGuard<Account>) {
        self.locks.insert(guard.id, guard);
    }

    /// Stage an account write
    ///
    /// Fails unless this unit holds the account's lock.
    pub fn stage_account(&mut self, account: Account) -> Result<(), TransferError> {
        if !self.is_locked(account.id) {
            return Err(TransferError::storage(format!(
                "account {} saved without holding its lock",
                account.id
            )));
        }
        self.staged.insert(account.id, account);
        Ok(())
    }

    /// Register an effect to run at commit, while the locks are still held
    pub fn defer<F>(&mut self, effect: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.deferred.push(Box::new(effect));
    }

    /// Apply every staged effect, then release the locks
    ///
    /// Staged balances are written through the held guards first, then the
    /// deferred effects run in registration order.
    pub fn commit(mut self) {
        let staged = std::mem::take(&mut self.staged);
        for (id, account) in staged {
            if let Some(guard) = self.locks.get_mut(&id) {
                **guard = account;
            }
        }

        for effect in std::mem::take(&mut self.deferred) {
            effect();
        }

        self.state = UnitState::Committed;
        debug!(unit = self.id, accounts = ?self.locked_ids(), "unit of work committed");
        self.locks.clear();
    }

    /// Discard every staged effect and release the locks
    pub fn rollback(mut self) {
        self.discard();
        self.state = UnitState::RolledBack;
        debug!(unit = self.id, "unit of work rolled back");
    }

    fn discard(&mut self) {
        self.staged.clear();
        self.deferred.clear();
        self.locks.clear();
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitState::Open {
            self.discard();
            debug!(unit = self.id, "unit of work dropped without commit");
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("locked", &self.locked_ids())
            .field("staged", &self.staged.keys().collect::<Vec<_>>())
            .field("deferred", &self.deferred.len())
            .field("state", &self.state)
            .finish()
    }
}
