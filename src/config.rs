//! Application configuration
//!
//! Loaded from an optional YAML file; every field has a default, so an empty
//! file (or no file) yields a working configuration. A few wallet settings can
//! then be overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `WALLET_COMMISSION_RATE` | `wallet.commission_rate` |
//! | `WALLET_IDEMPOTENCY_TTL` | `wallet.idempotency_ttl_secs` |
//! | `WALLET_TRANSFER_RATE_LIMIT` | `wallet.transfer_rate_limit` |
//!
//! ```yaml
//! log_level: info
//! use_json: false
//! wallet:
//!   commission_rate: "0.015"
//!   rounding: half_away_from_zero
//!   idempotency_ttl_secs: 300
//!   transfer_rate_limit: 5
//!   rate_limit_window_secs: 60
//!   lock_timeout_ms: 5000
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::core::{BoundarySettings, EngineSettings};
use crate::types::{CommissionRate, RoundingMode};

pub const ENV_COMMISSION_RATE: &str = "WALLET_COMMISSION_RATE";
pub const ENV_IDEMPOTENCY_TTL: &str = "WALLET_IDEMPOTENCY_TTL";
pub const ENV_TRANSFER_RATE_LIMIT: &str = "WALLET_TRANSFER_RATE_LIMIT";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Default `tracing` filter; `RUST_LOG` wins when set
    pub log_level: String,
    pub use_json: bool,
    pub wallet: WalletConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            use_json: false,
            wallet: WalletConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WalletConfig {
    /// Decimal fraction in [0, 1)
    pub commission_rate: String,
    pub rounding: RoundingMode,
    pub idempotency_ttl_secs: u64,
    /// Transfers per sender per window; 0 disables the limit
    pub transfer_rate_limit: u32,
    pub rate_limit_window_secs: u64,
    /// Give up on account locks after this long; unset waits forever
    pub lock_timeout_ms: Option<u64>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            commission_rate: "0.015".to_string(),
            rounding: RoundingMode::default(),
            idempotency_ttl_secs: 300,
            transfer_rate_limit: 5,
            rate_limit_window_secs: 60,
            lock_timeout_ms: None,
        }
    }
}

impl AppConfig {
    /// Load from `path` (or defaults), apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                Self::from_yaml_str(&content)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply overrides looked up by variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(rate) = lookup(ENV_COMMISSION_RATE) {
            self.wallet.commission_rate = rate.trim().to_string();
        }
        if let Some(ttl) = lookup(ENV_IDEMPOTENCY_TTL) {
            self.wallet.idempotency_ttl_secs = parse_env(ENV_IDEMPOTENCY_TTL, &ttl)?;
        }
        if let Some(limit) = lookup(ENV_TRANSFER_RATE_LIMIT) {
            self.wallet.transfer_rate_limit = parse_env(ENV_TRANSFER_RATE_LIMIT, &limit)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine_settings()?;
        if self.wallet.rate_limit_window_secs == 0 && self.wallet.transfer_rate_limit > 0 {
            return Err(ConfigError::InvalidValue {
                key: "wallet.rate_limit_window_secs".to_string(),
                value: "0".to_string(),
                reason: "must be positive while a rate limit is set".to_string(),
            });
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let commission_rate = CommissionRate::parse(&self.wallet.commission_rate).map_err(|e| {
            ConfigError::InvalidValue {
                key: "wallet.commission_rate".to_string(),
                value: self.wallet.commission_rate.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(EngineSettings {
            commission_rate,
            rounding: self.wallet.rounding,
        })
    }

    pub fn boundary_settings(&self) -> BoundarySettings {
        BoundarySettings {
            idempotency_ttl: Duration::from_secs(self.wallet.idempotency_ttl_secs),
            transfer_rate_limit: self.wallet.transfer_rate_limit,
            rate_limit_window: Duration::from_secs(self.wallet.rate_limit_window_secs),
        }
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.wallet.lock_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: "expected a non-negative integer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.engine_settings().unwrap(), EngineSettings::default());
        assert_eq!(config.boundary_settings(), BoundarySettings::default());
        assert_eq!(config.lock_timeout(), None);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            "use_json: true\nwallet:\n  rounding: truncate\n  lock_timeout_ms: 250\n",
        )
        .unwrap();

        assert!(config.use_json);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.wallet.rounding, RoundingMode::Truncate);
        assert_eq!(config.wallet.commission_rate, "0.015");
        assert_eq!(config.lock_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml_str("  \n").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let result = AppConfig::from_yaml_str("wallet: [not, a, map]");

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();

        config
            .apply_overrides(env(&[
                (ENV_COMMISSION_RATE, "0.02"),
                (ENV_IDEMPOTENCY_TTL, "60"),
                (ENV_TRANSFER_RATE_LIMIT, "0"),
            ]))
            .unwrap();

        assert_eq!(config.wallet.commission_rate, "0.02");
        assert_eq!(config.boundary_settings().idempotency_ttl, Duration::from_secs(60));
        assert_eq!(config.boundary_settings().transfer_rate_limit, 0);
    }

    #[rstest]
    #[case::ttl(ENV_IDEMPOTENCY_TTL, "soon")]
    #[case::negative_limit(ENV_TRANSFER_RATE_LIMIT, "-1")]
    fn test_bad_env_override(#[case] key: &str, #[case] value: &str) {
        let mut config = AppConfig::default();

        let result = config.apply_overrides(env(&[(key, value)]));

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[rstest]
    #[case::negative("-0.1")]
    #[case::one("1")]
    #[case::garbage("fifteen")]
    fn test_invalid_commission_rate(#[case] rate: &str) {
        let mut config = AppConfig::default();
        config.wallet.commission_rate = rate.to_string();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"log_level: debug\nwallet:\n  commission_rate: \"0.01\"\n")
            .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.engine_settings().unwrap().commission_rate,
            CommissionRate::parse("0.01").unwrap()
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load(Some(Path::new("does/not/exist.yaml")));

        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
