//! YAML run configuration: sync targets, retry policy, currencies

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file path (relative to current working directory)
pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

/// Environment variable overriding the config file path
pub const CONFIG_PATH_ENV: &str = "MFSYNC_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One exchange asset mapped to a ledger account, immutable after load
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AssetSyncTarget {
    /// Exchange asset ticker (e.g. BTC)
    pub symbol: String,
    /// Ledger account the valuation is written into
    pub account_name: String,
}

/// Bounded fixed-delay retry settings, global to the run
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_seconds: default_delay_seconds(),
        }
    }
}

/// Fiat target and bridge currency for two-hop conversion
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyConfig {
    #[serde(default = "default_fiat")]
    pub fiat: String,
    #[serde(default = "default_bridge")]
    pub bridge: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            fiat: default_fiat(),
            bridge: default_bridge(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_base_url")]
    pub base_url: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: default_ledger_base_url(),
        }
    }
}

/// Application configuration, loaded once at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub assets: Vec<AssetSyncTarget>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub currencies: CurrencyConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_seconds() -> u64 {
    60
}

fn default_fiat() -> String {
    "JPY".to_string()
}

fn default_bridge() -> String {
    "USDT".to_string()
}

fn default_ledger_base_url() -> String {
    "https://moneyforward.com".to_string()
}

impl AppConfig {
    /// Load and validate configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config: AppConfig =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path: CLI flag > env override > default
    pub fn resolve_path(flag: Option<&Path>) -> PathBuf {
        if let Some(path) = flag {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        for target in &self.assets {
            if target.symbol.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "asset symbol must not be empty".to_string(),
                ));
            }
            if target.account_name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "account_name for {} must not be empty",
                    target.symbol
                )));
            }
        }
        Ok(())
    }
}
