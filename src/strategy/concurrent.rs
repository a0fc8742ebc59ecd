//! Concurrent batch processing strategy
//!
//! Reads transfers in batches and runs each batch with many transfers in
//! flight on a multi-threaded tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ConcurrentProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent)
//!     ├── AsyncReader (batch CSV reading)
//!     └── TransferService ── TransferEngine (row locks in ascending id order)
//! ```
//!
//! # Ordering
//!
//! Batches run one after another, but transfers inside a batch may commit in
//! any order. No transfer is ever partially applied and balances always add
//! up; which of two competing transfers wins the last funds of an account is
//! decided by the engine's locks, not by file order.

use crate::core::AccountStore;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_balances_csv;
use crate::strategy::{ensure_readable, PipelineConfig, ProcessingStrategy, ProcessingSummary, Wallet};
use crate::types::TransferError;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of transfers read per batch
    pub batch_size: usize,
    /// Maximum transfers in flight at once, also the worker thread count
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent = if max_concurrent == 0 {
            warn!(
                max_concurrent,
                default = default.max_concurrent,
                "invalid max_concurrent, using default"
            );
            default.max_concurrent
        } else {
            max_concurrent
        };

        Self {
            batch_size,
            max_concurrent,
        }
    }
}

/// Concurrent batch processing strategy
#[derive(Debug, Clone, Default)]
pub struct ConcurrentProcessingStrategy {
    pipeline: PipelineConfig,
    config: BatchConfig,
}

impl ConcurrentProcessingStrategy {
    pub fn new(pipeline: PipelineConfig, config: BatchConfig) -> Self {
        Self { pipeline, config }
    }
}

impl ProcessingStrategy for ConcurrentProcessingStrategy {
    /// Process transfers in concurrent batches
    ///
    /// 1. Seeds the account store from `accounts_path`
    /// 2. Creates a multi-threaded runtime with `max_concurrent` workers
    /// 3. Reads transfers in batches using AsyncReader
    /// 4. Spawns every transfer in a batch, keeping at most `max_concurrent` in flight
    /// 5. Waits for the batch to finish before reading the next
    /// 6. Writes the final balances sorted by account id
    fn process(
        &self,
        input_path: &Path,
        accounts_path: Option<&Path>,
        output: &mut dyn Write,
    ) -> Result<ProcessingSummary, TransferError> {
        ensure_readable(input_path)?;
        let wallet = Wallet::build(&self.pipeline, accounts_path)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent)
            .enable_time()
            .build()
            .map_err(|e| TransferError::storage(format!("Failed to create tokio runtime: {}", e)))?;

        runtime.block_on(async {
            let file = tokio::fs::File::open(input_path).await?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);
            let mut summary = ProcessingSummary::default();

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }
                debug!(size = batch.len(), "processing batch");

                let outcomes: Vec<_> = stream::iter(batch)
                    .map(|request| {
                        let service = Arc::clone(&wallet.service);
                        tokio::spawn(async move { service.submit(request).await })
                    })
                    .buffer_unordered(self.config.max_concurrent)
                    .collect()
                    .await;

                for outcome in outcomes {
                    match outcome {
                        Ok(result) => summary.record(result),
                        Err(join_error) => {
                            summary.rejected += 1;
                            error!(error = %join_error, "transfer task failed");
                        }
                    }
                }
            }

            info!(
                committed = summary.committed,
                rejected = summary.rejected,
                "concurrent processing finished"
            );

            let accounts = wallet.store.snapshot().await;
            write_balances_csv(&accounts, output)?;

            Ok(summary)
        })
    }
}
