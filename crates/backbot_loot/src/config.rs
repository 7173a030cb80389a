//! # Loot Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! document is a valid configuration.
//!
//! ```toml
//! catalog_root = "back_repo"
//! ledger_path = "loot.csv"
//! flush_interval_secs = 15
//! flush_mode = "in_place"        # or "atomic_rename"
//! rollback_threshold = 10000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actions::DEFAULT_ROLLBACK_THRESHOLD;
use crate::error::{LootError, LootResult};
use crate::flush::{StalenessPolicy, DEFAULT_FLUSH_INTERVAL};
use crate::store::FlushMode;

/// Settings for the catalog, the ledger file and the actions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LootConfig {
    /// Directory holding one subdirectory per tier.
    #[serde(default = "default_catalog_root")]
    pub catalog_root: PathBuf,

    /// The ledger CSV file.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Seconds a ledger change may stay unflushed.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// How the ledger file is rewritten.
    #[serde(default)]
    pub flush_mode: FlushMode,

    /// Rarity points needed before a rollback is allowed.
    #[serde(default = "default_rollback_threshold")]
    pub rollback_threshold: u64,
}

fn default_catalog_root() -> PathBuf {
    PathBuf::from("back_repo")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("loot.csv")
}

const fn default_flush_interval_secs() -> u64 {
    DEFAULT_FLUSH_INTERVAL.as_secs()
}

const fn default_rollback_threshold() -> u64 {
    DEFAULT_ROLLBACK_THRESHOLD
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            catalog_root: default_catalog_root(),
            ledger_path: default_ledger_path(),
            flush_interval_secs: default_flush_interval_secs(),
            flush_mode: FlushMode::default(),
            rollback_threshold: default_rollback_threshold(),
        }
    }
}

impl LootConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`LootError::InvalidConfig`] on a syntax error, an unknown
    /// key, or a value that fails [`LootConfig::validate`].
    pub fn from_toml_str(toml_str: &str) -> LootResult<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| LootError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`LootError::InvalidConfig`] if the file cannot be read or is
    /// not a valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> LootResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            LootError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`LootError::InvalidConfig`] if serialization fails.
    pub fn to_toml(&self) -> LootResult<String> {
        toml::to_string_pretty(self).map_err(|e| LootError::InvalidConfig(e.to_string()))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`LootError::InvalidConfig`] for a zero flush interval or an
    /// empty path.
    pub fn validate(&self) -> LootResult<()> {
        if self.flush_interval_secs == 0 {
            return Err(LootError::InvalidConfig(
                "flush_interval_secs must be positive".to_string(),
            ));
        }
        if self.catalog_root.as_os_str().is_empty() {
            return Err(LootError::InvalidConfig("catalog_root is empty".to_string()));
        }
        if self.ledger_path.as_os_str().is_empty() {
            return Err(LootError::InvalidConfig("ledger_path is empty".to_string()));
        }
        Ok(())
    }

    /// The configured flush interval.
    #[must_use]
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// A staleness flush policy on the configured interval.
    #[must_use]
    pub fn staleness_policy(&self) -> StalenessPolicy {
        StalenessPolicy::new(self.flush_interval())
    }
}
