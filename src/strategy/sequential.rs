//! Sequential processing strategy
//!
//! Processes transfers one at a time, in file order, on a single-threaded
//! tokio runtime. Output is fully deterministic for a given input.
//!
//! # Design
//!
//! The strategy only orchestrates, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Transfer processing to `TransferService`
//! - CSV output to `csv_format::write_balances_csv`

use crate::io::csv_format::{write_balances_csv, TransferCsvRecord};
use crate::io::sync_reader::SyncReader;
use crate::strategy::{ensure_readable, PipelineConfig, ProcessingStrategy, ProcessingSummary, Wallet};
use crate::core::AccountStore;
use crate::types::{TransferError, TransferRequest};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Sequential processing strategy
///
/// ```no_run
/// use wallet_transfer_engine::strategy::{
///     PipelineConfig, ProcessingStrategy, SequentialProcessingStrategy,
/// };
/// use std::path::Path;
///
/// let strategy = SequentialProcessingStrategy::new(PipelineConfig::default());
/// let mut output = std::io::stdout();
///
/// strategy
///     .process(Path::new("transfers.csv"), Some(Path::new("accounts.csv")), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequentialProcessingStrategy {
    pipeline: PipelineConfig,
}

impl SequentialProcessingStrategy {
    pub fn new(pipeline: PipelineConfig) -> Self {
        Self { pipeline }
    }
}

impl ProcessingStrategy for SequentialProcessingStrategy {
    /// Process transfers in file order
    ///
    /// 1. Seeds the account store from `accounts_path`
    /// 2. Streams transfer rows through `SyncReader`
    /// 3. Submits each transfer and waits for it before reading the next
    /// 4. Writes the final balances sorted by account id
    fn process(
        &self,
        input_path: &Path,
        accounts_path: Option<&Path>,
        output: &mut dyn Write,
    ) -> Result<ProcessingSummary, TransferError> {
        ensure_readable(input_path)?;
        let wallet = Wallet::build(&self.pipeline, accounts_path)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| TransferError::storage(format!("Failed to create tokio runtime: {}", e)))?;

        let reader = SyncReader::<TransferCsvRecord>::open(input_path)?;

        runtime.block_on(async {
            let mut summary = ProcessingSummary::default();

            for row in reader {
                match row {
                    Ok(record) => {
                        let outcome = wallet.service.submit(TransferRequest::from(record)).await;
                        summary.record(outcome);
                    }
                    Err(error) => warn!(code = error.code(), "skipping transfer row: {}", error),
                }
            }

            info!(
                committed = summary.committed,
                rejected = summary.rejected,
                "sequential processing finished"
            );

            let accounts = wallet.store.snapshot().await;
            write_balances_csv(&accounts, output)?;

            Ok(summary)
        })
    }
}
