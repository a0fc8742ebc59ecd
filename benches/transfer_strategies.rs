//! Benchmark suite for comparing processing strategies
//!
//! Compares the sequential and concurrent strategies using the divan
//! benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! # Benchmark Fixtures
//!
//! Fixtures are generated into a temporary directory before each benchmark:
//! 100 accounts with equal opening balances and N transfers cycling through
//! sender/receiver pairs, so both directions of each pair are contended.
//! Rate limiting is disabled so every transfer reaches the engine.

use std::fmt::Write as _;
use std::fs;
use tempfile::TempDir;
use wallet_transfer_engine::cli::StrategyType;
use wallet_transfer_engine::core::BoundarySettings;
use wallet_transfer_engine::strategy::{create_strategy, BatchConfig, PipelineConfig};

const ACCOUNTS: u64 = 100;

fn main() {
    divan::main();
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn generate(transfers: usize) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");

        let mut seeds = String::from("account,balance\n");
        for account in 1..=ACCOUNTS {
            writeln!(seeds, "{},1000000", account).unwrap();
        }

        let mut rows = String::from("sender,receiver,amount\n");
        for i in 0..transfers as u64 {
            let sender = i % ACCOUNTS + 1;
            // 7i + 3 never equals i modulo 100, so sender != receiver
            let receiver = (i * 7 + 3) % ACCOUNTS + 1;
            writeln!(rows, "{},{},{}.{:04}", sender, receiver, i % 50 + 1, i % 10_000).unwrap();
        }

        fs::write(dir.path().join("accounts.csv"), seeds).expect("Failed to write seeds");
        fs::write(dir.path().join("transfers.csv"), rows).expect("Failed to write transfers");
        Self { dir }
    }

    fn run(&self, strategy_type: StrategyType) {
        let pipeline = PipelineConfig {
            boundary: BoundarySettings {
                transfer_rate_limit: 0,
                ..BoundarySettings::default()
            },
            ..PipelineConfig::default()
        };
        let strategy = create_strategy(strategy_type, pipeline, Some(BatchConfig::default()));
        let mut output = Vec::new();

        strategy
            .process(
                &self.dir.path().join("transfers.csv"),
                Some(self.dir.path().join("accounts.csv").as_path()),
                &mut output,
            )
            .expect("Processing failed");
    }
}

/// Sequential strategy, transfers applied in file order
#[divan::bench(args = [100, 1_000, 10_000])]
fn sequential_strategy(bencher: divan::Bencher, transfers: usize) {
    let fixture = Fixture::generate(transfers);
    bencher.bench(|| fixture.run(StrategyType::Sequential));
}

/// Concurrent strategy, batches of 1000 with one task per transfer
#[divan::bench(args = [100, 1_000, 10_000])]
fn concurrent_strategy(bencher: divan::Bencher, transfers: usize) {
    let fixture = Fixture::generate(transfers);
    bencher.bench(|| fixture.run(StrategyType::Concurrent));
}
