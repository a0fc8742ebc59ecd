//! Core business logic module
//!
//! This module contains the transfer processing components:
//! - `traits` - Storage and boundary seams
//! - `unit_of_work` - All-or-nothing scope holding locks and staged writes
//! - `account_store` - Account balances with row-level locks
//! - `ledger` - Append-only transaction records and history queries
//! - `engine` - The atomic transfer protocol
//! - `idempotency`, `rate_limit`, `notification` - Boundary safeguards and events
//! - `service` - Boundary orchestration around the engine

pub mod account_store;
pub mod engine;
pub mod idempotency;
pub mod ledger;
pub mod notification;
pub mod rate_limit;
pub mod service;
pub mod traits;
pub mod unit_of_work;

pub use account_store::InMemoryAccountStore;
pub use engine::{EngineSettings, Quote, TransferEngine};
pub use idempotency::InMemoryDeduplicationStore;
pub use ledger::{Cursor, InMemoryLedger, TransactionPage, DEFAULT_PAGE_SIZE};
pub use notification::{JsonLinesSink, NullSink, TransactionCreated, TRANSACTION_CREATED};
pub use rate_limit::RateLimiter;
pub use service::{AccountHistory, BoundarySettings, HistoryItem, TransferService};
pub use traits::{AccountStore, DeduplicationStore, NotificationSink, TransactionLedger};
pub use unit_of_work::UnitOfWork;
