//! End-to-end integration tests
//!
//! These tests validate the complete transfer pipeline using predefined CSV
//! fixtures. Each test:
//! 1. Seeds accounts from accounts.csv in a fixture directory
//! 2. Processes transfers.csv through the selected strategy
//! 3. Compares the balance report with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Happy path transfers with commission
//! - Commission rounding and amount normalization
//! - Insufficient balance, invalid requests and unknown accounts
//! - Idempotency keys and per-sender rate limiting
//!
//! Every fixture is written so its final balances do not depend on the order
//! transfers commit in, and each one runs under both strategies.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;
    use wallet_transfer_engine::cli::StrategyType;
    use wallet_transfer_engine::strategy::{create_strategy, BatchConfig, PipelineConfig};
    use wallet_transfer_engine::types::TransferError;

    /// Run a fixture and compare the report with expected.csv
    fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let accounts_path = format!("{}/accounts.csv", fixture_dir);
        let transfers_path = format!("{}/transfers.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        for path in [&accounts_path, &transfers_path, &expected_path] {
            assert!(Path::new(path).exists(), "Fixture file not found: {}", path);
        }

        // small batches so multi-batch runs are covered too
        let strategy = create_strategy(
            strategy_type,
            PipelineConfig::default(),
            Some(BatchConfig::new(3, 4)),
        );

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");
        strategy
            .process(
                Path::new(&transfers_path),
                Some(Path::new(&accounts_path)),
                &mut temp_output,
            )
            .unwrap_or_else(|e| panic!("Failed to process transfers: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("commission_rounding")]
    #[case("insufficient_balance")]
    #[case("invalid_requests")]
    #[case("idempotency")]
    #[case("rate_limited")]
    #[case("transfer_ring")]
    #[case("precision")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sequential, StrategyType::Concurrent)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy);
    }

    #[rstest]
    fn test_events_file_gets_one_line_per_participant(
        #[values(StrategyType::Sequential, StrategyType::Concurrent)] strategy_type: StrategyType,
    ) {
        let events = NamedTempFile::new().expect("Failed to create temp file");
        let pipeline = PipelineConfig {
            events_path: Some(events.path().to_path_buf()),
            ..PipelineConfig::default()
        };
        let strategy = create_strategy(strategy_type, pipeline, None);
        let mut output = Vec::new();

        let summary = strategy
            .process(
                Path::new("tests/fixtures/happy_path/transfers.csv"),
                Some(Path::new("tests/fixtures/happy_path/accounts.csv")),
                &mut output,
            )
            .unwrap();

        let content = fs::read_to_string(events.path()).unwrap();
        let events: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(summary.committed, 2);
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e["event"] == "transaction.created"));

        let mut channels: Vec<&str> = events.iter().filter_map(|e| e["channel"].as_str()).collect();
        channels.sort_unstable();
        assert_eq!(channels, vec!["user.1", "user.2", "user.2", "user.3"]);
    }

    #[rstest]
    fn test_missing_transfers_file_is_fatal(
        #[values(StrategyType::Sequential, StrategyType::Concurrent)] strategy_type: StrategyType,
    ) {
        let strategy = create_strategy(strategy_type, PipelineConfig::default(), None);
        let mut output = Vec::new();

        let result = strategy.process(Path::new("tests/fixtures/missing.csv"), None, &mut output);

        assert!(matches!(result, Err(TransferError::FileNotFound { .. })));
    }

    #[rstest]
    fn test_missing_accounts_file_is_fatal(
        #[values(StrategyType::Sequential, StrategyType::Concurrent)] strategy_type: StrategyType,
    ) {
        let strategy = create_strategy(strategy_type, PipelineConfig::default(), None);
        let mut output = Vec::new();

        let result = strategy.process(
            Path::new("tests/fixtures/happy_path/transfers.csv"),
            Some(Path::new("tests/fixtures/happy_path/missing.csv")),
            &mut output,
        );

        assert!(matches!(result, Err(TransferError::FileNotFound { .. })));
    }
}
