//! "Transaction created" events
//!
//! After a transfer commits, both participants are told about it on their
//! private channel (`user.<id>`). The event carries the record plus the two
//! balances as of commit.
//!
//! Delivery goes through a [`NotificationSink`]. `JsonLinesSink` writes one
//! JSON envelope per line to any writer (stdout, a file, a socket bridge);
//! `NullSink` drops everything.

use std::io::Write;
use std::sync::Mutex;

use serde::Serialize;

use super::traits::NotificationSink;
use crate::types::{AccountId, Amount, Transaction, TransferError, TransferReceipt};

/// Event name seen by subscribers
pub const TRANSACTION_CREATED: &str = "transaction.created";

/// Private channel of one account
pub fn private_channel(account: AccountId) -> String {
    format!("user.{}", account)
}

/// Payload of the "transaction created" event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionCreated {
    pub transaction: Transaction,
    pub sender_balance: Amount,
    pub receiver_balance: Amount,
}

impl TransactionCreated {
    pub fn from_receipt(receipt: &TransferReceipt) -> Self {
        Self {
            transaction: receipt.transaction.clone(),
            sender_balance: receipt.sender_balance,
            receiver_balance: receipt.receiver_balance,
        }
    }

    /// Sender's channel first, then receiver's
    pub fn channels(&self) -> [String; 2] {
        [
            private_channel(self.transaction.sender_id),
            private_channel(self.transaction.receiver_id),
        ]
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    channel: &'a str,
    event: &'static str,
    payload: &'a TransactionCreated,
}

/// Sink writing newline-delimited JSON envelopes
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> Result<W, TransferError> {
        self.writer
            .into_inner()
            .map_err(|_| TransferError::storage("notification writer poisoned"))
    }
}

impl<W: Write + Send> NotificationSink for JsonLinesSink<W> {
    fn publish(&self, channel: &str, event: &TransactionCreated) -> Result<(), TransferError> {
        let line = serde_json::to_string(&Envelope {
            channel,
            event: TRANSACTION_CREATED,
            payload: event,
        })
        .map_err(|e| TransferError::storage(format!("failed to encode event: {}", e)))?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| TransferError::storage("notification writer poisoned"))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn publish(&self, _channel: &str, _event: &TransactionCreated) -> Result<(), TransferError> {
        Ok(())
    }
}
