//! Processing strategy module for transfer files
//!
//! This module defines the Strategy pattern for complete processing pipelines:
//! seed accounts, read transfers, push each one through the `TransferService`,
//! and write the final balances. Two implementations can be selected at
//! runtime: sequential (file order, one transfer at a time) and concurrent
//! (batches with many transfers in flight).

use crate::cli::StrategyType;
use crate::config::{AppConfig, ConfigError};
use crate::core::{
    AccountStore, BoundarySettings, EngineSettings, InMemoryAccountStore,
    InMemoryDeduplicationStore, InMemoryLedger, JsonLinesSink, NotificationSink, NullSink,
    TransactionLedger, TransferEngine, TransferService,
};
use crate::io::sync_reader::{open_input, read_seed_accounts};
use crate::types::{TransferError, TransferReceipt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub mod concurrent;
pub mod sequential;

pub use concurrent::{BatchConfig, ConcurrentProcessingStrategy};
pub use sequential::SequentialProcessingStrategy;

/// Wallet settings shared by every strategy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub engine: EngineSettings,
    pub boundary: BoundarySettings,
    pub lock_timeout: Option<Duration>,

    /// Where to append `transaction.created` events, one JSON object per line
    pub events_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_app_config(
        config: &AppConfig,
        events_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            engine: config.engine_settings()?,
            boundary: config.boundary_settings(),
            lock_timeout: config.lock_timeout(),
            events_path,
        })
    }
}

/// Processing strategy trait for complete transfer pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Process transfers from `input_path` and write final balances to `output`
    ///
    /// # Arguments
    ///
    /// * `input_path` - CSV of transfers (`sender,receiver,amount[,idempotency_key]`)
    /// * `accounts_path` - Optional CSV of opening balances (`account,balance`)
    /// * `output` - Destination for the `account,balance` report
    ///
    /// # Returns
    ///
    /// * `Ok(ProcessingSummary)` if the file was processed, even if some transfers were rejected
    /// * `Err(TransferError)` on a fatal error (missing file, unwritable output, runtime failure)
    ///
    /// Rejected transfers are logged with their error code and processing
    /// continues with the next one.
    fn process(
        &self,
        input_path: &Path,
        accounts_path: Option<&Path>,
        output: &mut dyn Write,
    ) -> Result<ProcessingSummary, TransferError>;
}

/// Counts of transfer outcomes for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub committed: usize,
    pub rejected: usize,
}

impl ProcessingSummary {
    pub(crate) fn record(&mut self, outcome: Result<TransferReceipt, TransferError>) {
        match outcome {
            Ok(receipt) => {
                self.committed += 1;
                info!(
                    tx_id = %receipt.transaction.id,
                    sender_balance = %receipt.sender_balance,
                    receiver_balance = %receipt.receiver_balance,
                    "transfer processed"
                );
            }
            Err(error) => {
                self.rejected += 1;
                warn!(code = error.code(), "transfer rejected: {}", error);
            }
        }
    }
}

/// Everything one run needs: a seeded store and the service on top of it
pub(crate) struct Wallet {
    pub store: Arc<InMemoryAccountStore>,
    pub service: Arc<TransferService>,
}

impl Wallet {
    /// Build the stores, seed them, and wire the service
    pub fn build(config: &PipelineConfig, accounts_path: Option<&Path>) -> Result<Self, TransferError> {
        let store = Arc::new(match config.lock_timeout {
            Some(timeout) => InMemoryAccountStore::with_lock_timeout(timeout),
            None => InMemoryAccountStore::new(),
        });

        if let Some(path) = accounts_path {
            for account in read_seed_accounts(path)? {
                if let Err(error) = store.open_account(account.id, account.balance) {
                    warn!(code = error.code(), "skipping seed account: {}", error);
                }
            }
            info!(accounts = store.len(), "accounts seeded");
        }

        let notifier: Arc<dyn NotificationSink> = match &config.events_path {
            Some(path) => Arc::new(JsonLinesSink::new(BufWriter::new(File::create(path)?))),
            None => Arc::new(NullSink),
        };

        if config.boundary.transfer_rate_limit > 0 {
            info!(
                limit = config.boundary.transfer_rate_limit,
                window_secs = config.boundary.rate_limit_window.as_secs(),
                "per-sender rate limit active; set wallet.transfer_rate_limit to 0 to disable"
            );
        }

        let engine = Arc::new(TransferEngine::new(
            Arc::clone(&store) as Arc<dyn AccountStore>,
            Arc::new(InMemoryLedger::new()) as Arc<dyn TransactionLedger>,
            config.engine,
        ));
        let service = Arc::new(TransferService::new(
            engine,
            Arc::new(InMemoryDeduplicationStore::new()),
            notifier,
            config.boundary,
        ));

        Ok(Self { store, service })
    }
}

/// Fail early with `FileNotFound` before a runtime is spun up
pub(crate) fn ensure_readable(path: &Path) -> Result<(), TransferError> {
    open_input(path).map(|_| ())
}

/// Create a processing strategy based on the specified strategy type
pub fn create_strategy(
    strategy_type: StrategyType,
    pipeline: PipelineConfig,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sequential => Box::new(SequentialProcessingStrategy::new(pipeline)),
        StrategyType::Concurrent => Box::new(ConcurrentProcessingStrategy::new(
            pipeline,
            batch.unwrap_or_default(),
        )),
    }
}
