//! Wallet Transfer Engine CLI
//!
//! Command-line interface for applying wallet transfers from CSV files.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --accounts accounts.csv transfers.csv > balances.csv
//! cargo run -- --accounts accounts.csv --strategy concurrent transfers.csv > balances.csv
//! cargo run -- --accounts accounts.csv --strategy concurrent --batch-size 2000 --max-concurrent 8 transfers.csv
//! cargo run -- --config wallet.yaml --events events.jsonl --accounts accounts.csv transfers.csv
//! ```
//!
//! Final balances go to stdout as `account,balance`; logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success (individual rejected transfers do not change this)
//! - 1: Error (bad configuration, file not found, file not readable, etc.)

use std::process;
use tracing::error;
use wallet_transfer_engine::cli;
use wallet_transfer_engine::config::AppConfig;
use wallet_transfer_engine::logging;
use wallet_transfer_engine::strategy::{self, PipelineConfig};

fn main() {
    let args = cli::parse_args();

    let config = match AppConfig::load(args.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    logging::init_logging(&config);

    let pipeline = match PipelineConfig::from_app_config(&config, args.events_file.clone()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let batch = matches!(args.strategy, cli::StrategyType::Concurrent).then(|| args.to_batch_config());
    let strategy = strategy::create_strategy(args.strategy, pipeline, batch);

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, args.accounts_file.as_deref(), &mut output) {
        error!(code = e.code(), "{}", e);
        process::exit(1);
    }
}
