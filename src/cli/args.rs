use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Apply wallet transfers with commission from CSV files
#[derive(Parser, Debug)]
#[command(name = "wallet-transfer-engine")]
#[command(about = "Apply wallet transfers with commission from CSV files", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing transfers
    #[arg(value_name = "TRANSFERS", help = "Path to the transfers CSV file")]
    pub input_file: PathBuf,

    /// Opening balances
    #[arg(
        long = "accounts",
        value_name = "SEED",
        help = "CSV of opening balances with columns account,balance"
    )]
    pub accounts_file: Option<PathBuf>,

    /// Processing strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "sequential",
        help = "Processing strategy: 'sequential' in file order or 'concurrent' in parallel batches"
    )]
    pub strategy: StrategyType,

    /// Number of transfers per batch (concurrent mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of transfers per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of transfers in flight (concurrent mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of transfers processed at once (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,

    /// YAML configuration file
    #[arg(
        long = "config",
        value_name = "FILE",
        help = "YAML configuration file. Without one, each sender is limited to 5 transfers per 60s; \
                set wallet.transfer_rate_limit: 0 to process large files unthrottled"
    )]
    pub config_file: Option<PathBuf>,

    /// Events output
    #[arg(
        long = "events",
        value_name = "FILE",
        help = "Write transaction.created events to this file as JSON lines"
    )]
    pub events_file: Option<PathBuf>,
}

/// Available processing strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sequential,
    Concurrent,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments, falling back to defaults
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent.unwrap_or(default.max_concurrent),
            )
        } else {
            BatchConfig::default()
        }
    }
}
