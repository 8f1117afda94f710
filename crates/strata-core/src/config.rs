//! Runtime configuration.
//!
//! Loaded from a TOML file by the embedding host. Every section has
//! defaults, so an empty file is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_types::ChainConfig;

/// Runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Read-side cache budgets
    pub cache: CacheConfig,
    /// Event feed configuration
    pub events: EventConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Overrides the configuration plugin's chain parameters when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainConfig>,
}

impl RuntimeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_toml_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let cache = &self.cache;
        for (name, budget) in [
            ("receipts", cache.receipts),
            ("blocks_by_number", cache.blocks_by_number),
            ("blocks_by_hash", cache.blocks_by_hash),
            ("tx_lookups", cache.tx_lookups),
        ] {
            if budget == 0 {
                anyhow::bail!("Cache budget '{}' cannot be 0", name);
            }
        }

        if self.events.channel_capacity == 0 {
            anyhow::bail!("Event channel capacity cannot be 0");
        }

        if let Some(chain) = &self.chain {
            chain.validate()?;
        }

        Ok(())
    }
}

/// Cache configuration (entry budgets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Receipts by block hash
    pub receipts: usize,
    /// Blocks by number
    pub blocks_by_number: usize,
    /// Blocks by hash
    pub blocks_by_hash: usize,
    /// Transaction lookups by hash
    pub tx_lookups: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            receipts: 1024,
            blocks_by_number: 1024,
            blocks_by_hash: 1024,
            tx_lookups: 1024,
        }
    }
}

/// Event feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Events buffered per subscriber before the slowest one lags
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 128,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter, e.g. `info` or `strata_core=debug`
    pub level: String,
    /// JSON output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.receipts, 1024);
        assert_eq!(config.events.channel_capacity, 128);
        assert!(config.chain.is_none());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [cache]
            receipts = 16

            [logging]
            level = "debug"
            json = true

            [chain]
            chain_id = 69420
            london_block = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.receipts, 16);
        assert_eq!(config.cache.tx_lookups, 1024);
        assert!(config.logging.json);
        let chain = config.chain.unwrap();
        assert_eq!(chain.chain_id, 69420);
        assert_eq!(chain.london_block, Some(5));
        assert_eq!(chain.elasticity_multiplier, 2);
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        let mut config = RuntimeConfig::default();
        config.cache.blocks_by_hash = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("blocks_by_hash"));

        let mut config = RuntimeConfig::default();
        config.events.channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = RuntimeConfig::default();
        config.chain = Some(ChainConfig {
            elasticity_multiplier: 0,
            ..ChainConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_roundtrip() {
        let mut config = RuntimeConfig::default();
        config.cache.receipts = 7;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes()).unwrap();

        let loaded = RuntimeConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuntimeConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
