//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `amount`: Scale-4 fixed-point arithmetic
//! - `account`: Account-related types
//! - `transaction`: Ledger records, requests and receipts
//! - `error`: Error types for the wallet

pub mod account;
pub mod amount;
pub mod error;
pub mod transaction;

pub use account::{Account, AccountId};
pub use amount::{Amount, CommissionRate, InvalidCommissionRate, MalformedAmount, RoundingMode};
pub use error::{ErrorKind, InvalidTransferReason, TransferError};
pub use transaction::{Direction, Transaction, TransactionId, TransferReceipt, TransferRequest};
