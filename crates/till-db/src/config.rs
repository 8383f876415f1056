//! # Ledger Configuration
//!
//! Where the database lives and which deployment switches are on.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_DB_PATH=/var/lib/till/till.db                                 │
//! │     TILL_ALLOW_NEGATIVE_STOCK=true                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $TILL_CONFIG, or                                                   │
//! │     ~/.config/till/ledger.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.till.ledger/ledger.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     till.db in the data dir, strict stock and cash                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # ledger.toml
//! [database]
//! path = "/var/lib/till/till.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [policy]
//! allow_negative_stock = false
//! allow_negative_cash = false
//! change_tolerance_cents = 1
//! igtf_rate_bps = 300
//!
//! [store]
//! terminal = "Register 1"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::pool::DbConfig;
use till_core::LedgerPolicy;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TILL_CONFIG";

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a unit waits for the write lock before failing.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "till", "ledger")
        .map(|dirs| dirs.data_dir().join("till.db"))
        .unwrap_or_else(|| PathBuf::from("till.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Name of this terminal, used as the origin of exported stock movements.
    #[serde(default = "default_terminal")]
    pub terminal: String,
}

fn default_terminal() -> String {
    "Register 1".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            terminal: default_terminal(),
        }
    }
}

// =============================================================================
// Ledger Configuration
// =============================================================================

/// Full ledger configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub policy: LedgerPolicy,

    #[serde(default)]
    pub store: StoreSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file: `config_path`, else `$TILL_CONFIG`, else the
    ///    platform config dir
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_config_path);
        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Missing sections and keys take defaults.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if !(0..=100).contains(&self.policy.change_tolerance_cents) {
            return Err(ConfigError::Invalid(format!(
                "policy.change_tolerance_cents must be between 0 and 100, got {}",
                self.policy.change_tolerance_cents
            )));
        }

        if self.policy.igtf_rate_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "policy.igtf_rate_bps must be at most 10000, got {}",
                self.policy.igtf_rate_bps
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("TILL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = var("TILL_ALLOW_NEGATIVE_STOCK") {
            match parse_flag(&value) {
                Some(flag) => self.policy.allow_negative_stock = flag,
                None => warn!(value = %value, "Ignoring TILL_ALLOW_NEGATIVE_STOCK"),
            }
        }

        if let Some(value) = var("TILL_ALLOW_NEGATIVE_CASH") {
            match parse_flag(&value) {
                Some(flag) => self.policy.allow_negative_cash = flag,
                None => warn!(value = %value, "Ignoring TILL_ALLOW_NEGATIVE_CASH"),
            }
        }

        if let Some(value) = var("TILL_CHANGE_TOLERANCE_CENTS") {
            match value.trim().parse::<i64>() {
                Ok(cents) => self.policy.change_tolerance_cents = cents,
                Err(_) => warn!(value = %value, "Ignoring TILL_CHANGE_TOLERANCE_CENTS"),
            }
        }

        if let Some(value) = var("TILL_IGTF_BPS") {
            match value.trim().parse::<u32>() {
                Ok(bps) => self.policy.igtf_rate_bps = bps,
                Err(_) => warn!(value = %value, "Ignoring TILL_IGTF_BPS"),
            }
        }

        if let Some(value) = var("TILL_BUSY_TIMEOUT_SECS") {
            match value.trim().parse::<u64>() {
                Ok(secs) => self.database.busy_timeout_secs = secs,
                Err(_) => warn!(value = %value, "Ignoring TILL_BUSY_TIMEOUT_SECS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "till", "ledger")
            .map(|dirs| dirs.config_dir().join("ledger.toml"))
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Pool settings for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
    }

    /// Deployment switches for the engines.
    pub fn policy(&self) -> LedgerPolicy {
        self.policy.clone()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_strict() {
        let config = LedgerConfig::default();
        assert!(!config.policy.allow_negative_stock);
        assert!(!config.policy.allow_negative_cash);
        assert_eq!(config.policy.change_tolerance_cents, 1);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml(
            r#"
            [database]
            path = "/tmp/till.db"

            [policy]
            allow_negative_stock = true
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/till.db"));
        assert_eq!(config.database.busy_timeout_secs, 5);
        assert!(config.policy.allow_negative_stock);
        assert_eq!(config.policy.igtf_rate_bps, 300);
        assert_eq!(config.store.terminal, "Register 1");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TILL_DB_PATH", "/data/pos.db"),
            ("TILL_ALLOW_NEGATIVE_CASH", "yes"),
            ("TILL_CHANGE_TOLERANCE_CENTS", "5"),
            ("TILL_IGTF_BPS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = LedgerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/pos.db"));
        assert!(config.policy.allow_negative_cash);
        assert_eq!(config.policy.change_tolerance_cents, 5);
        assert_eq!(config.policy.igtf_rate_bps, 300);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = LedgerConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.policy.change_tolerance_cents = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "[store]\nterminal = \"Back office\"\n").unwrap();

        let config = LedgerConfig::load(Some(path)).unwrap();
        assert_eq!(config.store.terminal, "Back office");
    }
}
