//! Append-only transaction ledger
//!
//! This module provides the `InMemoryLedger` struct, which stores committed
//! transfer records and answers "history for this account" queries.
//!
//! # Design
//!
//! Records live in a `DashMap` keyed by transaction id, alongside a
//! per-participant index of ids kept in a `BTreeSet`. Because ids are ULIDs,
//! walking an index backwards yields newest-first order without a separate
//! timestamp index.
//!
//! Writes never happen directly: `create` validates the record and defers the
//! append to the caller's `UnitOfWork`, so a record only becomes visible when
//! the transfer that produced it commits. Reads take no account locks.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;

use super::traits::TransactionLedger;
use super::unit_of_work::UnitOfWork;
use crate::types::{
    AccountId, InvalidTransferReason, Transaction, TransactionId, TransferError,
};

/// Page size used when a caller asks for zero items
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Larger page requests are cut down to this
pub const MAX_PAGE_SIZE: usize = 100;

/// Position in a participant's history
///
/// Points at the last record of the previous page; the next page starts
/// strictly before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(pub TransactionId);

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cursor {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Cursor)
    }
}

/// One page of history, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,

    /// `None` when this is the last page
    pub next_cursor: Option<Cursor>,
}

#[derive(Debug, Default)]
struct LedgerState {
    records: DashMap<TransactionId, Transaction>,
    by_participant: DashMap<AccountId, BTreeSet<TransactionId>>,
}

impl LedgerState {
    fn append(&self, record: Transaction) {
        let (id, sender, receiver) = (record.id, record.sender_id, record.receiver_id);

        // record first, so anything reachable from the index can be read
        self.records.insert(id, record);
        self.by_participant.entry(sender).or_default().insert(id);
        self.by_participant.entry(receiver).or_default().insert(id);
    }
}

/// Thread-safe append-only ledger
///
/// Cloning is cheap and every clone shares the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(&self, record: &Transaction) -> Result<(), TransferError> {
        if record.sender_id == record.receiver_id {
            return Err(TransferError::invalid_transfer(
                InvalidTransferReason::SameParticipant,
            ));
        }
        if !record.amount.is_positive() {
            return Err(TransferError::invalid_transfer(
                InvalidTransferReason::NonPositiveAmount,
            ));
        }
        if record.commission_fee.is_negative() {
            return Err(TransferError::storage(format!(
                "transaction {} has a negative commission fee",
                record.id
            )));
        }
        if self.state.records.contains_key(&record.id) {
            return Err(TransferError::storage(format!(
                "transaction {} already recorded",
                record.id
            )));
        }
        Ok(())
    }
}

impl TransactionLedger for InMemoryLedger {
    fn create(
        &self,
        uow: &mut UnitOfWork,
        record: Transaction,
    ) -> Result<Transaction, TransferError> {
        self.validate(&record)?;

        let state = Arc::clone(&self.state);
        let staged = record.clone();
        uow.defer(move || state.append(staged));

        Ok(record)
    }

    fn list_for_participant(
        &self,
        account: AccountId,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> TransactionPage {
        let limit = match limit {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };

        // Collect ids first so the index shard is released before record lookups.
        let mut ids: Vec<TransactionId> = match self.state.by_participant.get(&account) {
            Some(index) => match cursor {
                Some(Cursor(before)) => index.range(..before).rev().take(limit + 1).copied().collect(),
                None => index.iter().rev().take(limit + 1).copied().collect(),
            },
            None => Vec::new(),
        };

        let has_more = ids.len() > limit;
        ids.truncate(limit);

        let items: Vec<Transaction> = ids
            .iter()
            .filter_map(|id| self.get(*id))
            .collect();
        let next_cursor = if has_more {
            items.last().map(|record| Cursor(record.id))
        } else {
            None
        };

        TransactionPage { items, next_cursor }
    }

    fn get(&self, id: TransactionId) -> Option<Transaction> {
        self.state
            .records
            .get(&id)
            .map(|entry| entry.value().clone())
    }

    fn len(&self) -> usize {
        self.state.records.len()
    }
}
