//! Wallet Transfer Engine Library
//! # Overview
//!
//! This library moves money between two wallet accounts, charging the sender a
//! commission, and records every transfer in an append-only ledger. Each
//! transfer is atomic and safe under concurrent access.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Amount, Account, Transaction, errors)
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - The atomic transfer protocol
//!   - [`core::account_store`] - Account balances with row-level locks
//!   - [`core::ledger`] - Append-only transaction records
//!   - [`core::service`] - Rate limiting, idempotency and notifications around the engine
//! - [`io`] - CSV reading and balance output
//! - [`strategy`] - Sequential and concurrent file pipelines
//! - [`cli`], [`config`], [`logging`] - Binary plumbing
//!
//! # Transfer Rules
//!
//! - Sender and receiver must differ
//! - The amount must be a positive decimal; it is carried at four decimal places
//! - The sender pays `amount + commission` (1.5% by default); the receiver
//!   gets `amount`
//! - A transfer the sender cannot cover is rejected and changes nothing
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wallet_transfer_engine::core::{
//!     AccountStore, EngineSettings, InMemoryAccountStore, InMemoryLedger, TransactionLedger,
//!     TransferEngine,
//! };
//! use wallet_transfer_engine::types::Amount;
//!
//! # async fn demo() -> Result<(), wallet_transfer_engine::types::TransferError> {
//! let store = Arc::new(InMemoryAccountStore::new());
//! store.open_account(1, Amount::normalize("1000").unwrap())?;
//! store.open_account(2, Amount::ZERO)?;
//!
//! let engine = TransferEngine::new(
//!     store.clone() as Arc<dyn AccountStore>,
//!     Arc::new(InMemoryLedger::new()) as Arc<dyn TransactionLedger>,
//!     EngineSettings::default(),
//! );
//! let tx = engine.transfer(1, 2, "100").await?;
//! assert_eq!(tx.commission_fee.to_string(), "1.5000");
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use self::core::{TransferEngine, TransferService};
pub use io::write_balances_csv;
pub use types::{
    Account, AccountId, Amount, Transaction, TransactionId, TransferError, TransferReceipt,
    TransferRequest,
};
