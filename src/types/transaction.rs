//! Transaction-related types for the wallet
//!
//! This module defines the immutable ledger record produced by every successful
//! transfer, the transient request that asks for one, and the receipt handed
//! back to callers.

use super::account::AccountId;
use super::amount::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Transaction identifier
///
/// A ULID: lexicographic and numeric order both follow creation time, so
/// history queries can order by id without a separate timestamp index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(Ulid);

impl TransactionId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// Millisecond timestamp embedded in the id
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.0.datetime())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

impl Serialize for TransactionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which side of a transaction an account is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The account was debited
    Outgoing,
    /// The account was credited
    Incoming,
}

/// Completed transfer record
///
/// Created exactly once per successful transfer and never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,

    /// The debited account
    pub sender_id: AccountId,

    /// The credited account
    pub receiver_id: AccountId,

    /// Amount credited to the receiver (excludes the commission)
    pub amount: Amount,

    /// Fee charged to the sender on top of `amount`
    pub commission_fee: Amount,

    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a record whose creation time is taken from the id
    pub fn new(
        id: TransactionId,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Amount,
        commission_fee: Amount,
    ) -> Self {
        Self {
            id,
            sender_id,
            receiver_id,
            amount,
            commission_fee,
            created_at: id.created_at(),
        }
    }

    /// Direction of this record as seen from `account`
    pub fn direction_for(&self, account: AccountId) -> Option<Direction> {
        if self.sender_id == account {
            Some(Direction::Outgoing)
        } else if self.receiver_id == account {
            Some(Direction::Incoming)
        } else {
            None
        }
    }
}

/// Inbound transfer request
///
/// Transient: validated by the engine and discarded. The amount is kept as
/// the caller supplied it; normalization happens inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransferRequest {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: String,

    /// Optional client token used to reject duplicate submissions
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    pub fn new(sender: AccountId, receiver: AccountId, amount: impl Into<String>) -> Self {
        Self {
            sender,
            receiver,
            amount: amount.into(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Result of a committed transfer
///
/// Carries everything needed to build the "transaction created" notification:
/// the record plus both balances as they stood at commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub transaction: Transaction,
    pub sender_balance: Amount,
    pub receiver_balance: Amount,
}
