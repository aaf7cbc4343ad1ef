//! Configuration for the loyalty ledger

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Settlement gateway configuration
    pub settlement: SettlementConfig,

    /// Entity store configuration
    pub storage: StorageConfig,

    /// Balance cache configuration
    pub balance_cache: BalanceCacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "loyalty-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            settlement: SettlementConfig::default(),
            storage: StorageConfig::default(),
            balance_cache: BalanceCacheConfig::default(),
        }
    }
}

/// Settlement gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Upper bound on a single gateway call (milliseconds).
    /// A call that exceeds it counts as a failed settlement.
    pub timeout_ms: u64,

    /// Simulated latency of the mock gateway (milliseconds)
    pub mock_latency_ms: u64,

    /// Probability that a mock transfer succeeds (0.0 - 1.0)
    pub mock_success_rate: f64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            mock_latency_ms: 0,
            mock_success_rate: 1.0,
        }
    }
}

impl SettlementConfig {
    /// Timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Entity store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Load the sample business, token and rewards at startup
    pub seed_sample_data: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            seed_sample_data: true,
        }
    }
}

/// Balance cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceCacheConfig {
    /// Memoize derived balances
    pub enabled: bool,
}

impl Default for BalanceCacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(timeout) = std::env::var("LOYALTY_SETTLEMENT_TIMEOUT_MS") {
            config.settlement.timeout_ms = parse_env("LOYALTY_SETTLEMENT_TIMEOUT_MS", &timeout)?;
        }

        if let Ok(seed) = std::env::var("LOYALTY_SEED_SAMPLE_DATA") {
            config.storage.seed_sample_data = parse_env("LOYALTY_SEED_SAMPLE_DATA", &seed)?;
        }

        if let Ok(cache) = std::env::var("LOYALTY_BALANCE_CACHE") {
            config.balance_cache.enabled = parse_env("LOYALTY_BALANCE_CACHE", &cache)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.settlement.timeout_ms == 0 {
            return Err(crate::Error::Config(
                "settlement.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.settlement.mock_success_rate) {
            return Err(crate::Error::Config(format!(
                "settlement.mock_success_rate must be within 0.0..=1.0, got {}",
                self.settlement.mock_success_rate
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| crate::Error::Config(format!("Invalid value for {}: {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "loyalty-ledger");
        assert_eq!(config.settlement.timeout(), Duration::from_secs(30));
        assert!(config.storage.seed_sample_data);
        assert!(config.balance_cache.enabled);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[settlement]\ntimeout_ms = 250\n\n[storage]\nseed_sample_data = false"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.settlement.timeout_ms, 250);
        assert!(!config.storage.seed_sample_data);
        // Unspecified sections keep their defaults
        assert!(config.balance_cache.enabled);
        assert_eq!(config.service_name, "loyalty-ledger");
    }

    #[test]
    fn test_from_file_rejects_bad_rate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[settlement]\nmock_success_rate = 1.5").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/nonexistent/loyalty.toml").unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
