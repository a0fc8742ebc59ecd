//! Error types for the wallet transfer engine
//!
//! This module defines all error types that can occur while moving money
//! between accounts and while feeding the engine from files.
//!
//! # Error Categories
//!
//! - **Business errors**: invalid transfers, insufficient balance, unknown
//!   accounts, arithmetic overflow. Always raised before any mutation.
//! - **Boundary errors**: duplicate submissions and rate limiting, raised
//!   before the engine is invoked.
//! - **Infrastructure errors**: storage failures, file I/O and CSV parsing.

use super::account::AccountId;
use super::amount::{Amount, MalformedAmount};
use thiserror::Error;

/// Why a transfer request was rejected as invalid
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTransferReason {
    #[error("sender and receiver must be different accounts")]
    SameParticipant,

    #[error("malformed amount: {0}")]
    MalformedAmount(#[from] MalformedAmount),

    #[error("transfer amount must be greater than zero")]
    NonPositiveAmount,
}

/// Coarse classification used at the boundary to pick an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client-fixable input or state problem (4xx-equivalent)
    ClientInput,
    /// The same idempotency token is already in flight or completed
    Duplicate,
    /// Too many requests from one sender
    RateLimited,
    /// Storage or I/O failure (5xx-equivalent)
    Infrastructure,
}

/// Main error type for the wallet
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    /// Input file not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// I/O error while reading input or writing output
    #[error("I/O error: {message}")]
    IoError { message: String },

    /// CSV parsing error; the offending record is skipped
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        line: Option<u64>,
        message: String,
    },

    /// Same participant, malformed amount or non-positive amount
    #[error("Invalid transfer: {reason}")]
    InvalidTransfer { reason: InvalidTransferReason },

    /// Sender's locked balance does not cover amount plus commission
    #[error(
        "Insufficient balance for account {account}: available {available}, required {required}"
    )]
    InsufficientBalance {
        account: AccountId,
        available: Amount,
        required: Amount,
    },

    /// Referenced account does not exist
    #[error("Account {account} not found")]
    AccountNotFound { account: AccountId },

    /// Account opened twice
    #[error("Account {account} already exists")]
    DuplicateAccount { account: AccountId },

    /// Balance arithmetic would leave the representable range
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow {
        operation: String,
        account: AccountId,
    },

    /// The idempotency key is already reserved
    #[error("Duplicate transfer request '{key}'")]
    DuplicateRequest { key: String },

    /// Sender exceeded the transfer rate limit
    #[error("Too many transfers from account {account}: limit is {limit} per {window_secs}s")]
    RateLimited {
        account: AccountId,
        limit: u32,
        window_secs: u64,
    },

    /// Storage-layer failure (lock timeout, broken invariant, poisoned state)
    #[error("Storage failure: {message}")]
    Storage { message: String },
}

impl From<std::io::Error> for TransferError {
    fn from(error: std::io::Error) -> Self {
        TransferError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for TransferError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        TransferError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<MalformedAmount> for TransferError {
    fn from(error: MalformedAmount) -> Self {
        TransferError::invalid_transfer(InvalidTransferReason::MalformedAmount(error))
    }
}

impl TransferError {
    /// Create an InvalidTransfer error
    pub fn invalid_transfer(reason: InvalidTransferReason) -> Self {
        TransferError::InvalidTransfer { reason }
    }

    /// Create an InsufficientBalance error
    pub fn insufficient_balance(account: AccountId, available: Amount, required: Amount) -> Self {
        TransferError::InsufficientBalance {
            account,
            available,
            required,
        }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account: AccountId) -> Self {
        TransferError::AccountNotFound { account }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        TransferError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        TransferError::Storage {
            message: message.into(),
        }
    }

    /// Boundary classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InvalidTransfer { .. }
            | TransferError::InsufficientBalance { .. }
            | TransferError::AccountNotFound { .. }
            | TransferError::DuplicateAccount { .. }
            | TransferError::ArithmeticOverflow { .. }
            | TransferError::ParseError { .. } => ErrorKind::ClientInput,
            TransferError::DuplicateRequest { .. } => ErrorKind::Duplicate,
            TransferError::RateLimited { .. } => ErrorKind::RateLimited,
            TransferError::FileNotFound { .. }
            | TransferError::IoError { .. }
            | TransferError::Storage { .. } => ErrorKind::Infrastructure,
        }
    }

    /// Whether the engine rejected the transfer on business grounds
    ///
    /// Business rejections happen before any mutation, so an idempotency
    /// reservation taken for the request must be released.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            TransferError::InvalidTransfer { .. }
                | TransferError::InsufficientBalance { .. }
                | TransferError::AccountNotFound { .. }
                | TransferError::ArithmeticOverflow { .. }
        )
    }

    /// Stable error code for logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::FileNotFound { .. } => "FILE_NOT_FOUND",
            TransferError::IoError { .. } => "IO_ERROR",
            TransferError::ParseError { .. } => "PARSE_ERROR",
            TransferError::InvalidTransfer { reason } => match reason {
                InvalidTransferReason::SameParticipant => "SAME_PARTICIPANT",
                InvalidTransferReason::MalformedAmount(_) => "MALFORMED_AMOUNT",
                InvalidTransferReason::NonPositiveAmount => "NON_POSITIVE_AMOUNT",
            },
            TransferError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            TransferError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            TransferError::DuplicateAccount { .. } => "DUPLICATE_ACCOUNT",
            TransferError::ArithmeticOverflow { .. } => "ARITHMETIC_OVERFLOW",
            TransferError::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            TransferError::RateLimited { .. } => "RATE_LIMITED",
            TransferError::Storage { .. } => "STORAGE_FAILURE",
        }
    }
}
