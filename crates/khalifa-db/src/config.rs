//! # Application Configuration
//!
//! Settings for the store: where the database lives, what is printed on
//! documents, how numbers look and how stock shortages are handled.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KHALIFA_DB_PATH=/data/khalifa.db                                   │
//! │     KHALIFA_OVERSELL=reject                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/khalifa/khalifa.toml (Linux)                             │
//! │     ~/Library/Application Support/com.khalifa.store/ (macOS)           │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     khalifa.db in the platform data dir, Egyptian locale, warn         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/home/owner/khalifa.db"
//! max_connections = 1
//! acquire_timeout_secs = 30
//!
//! [store]
//! name = "الخليفة"
//! address = "شارع الجمهورية، أسيوط"
//! phone = "0882345678"
//!
//! [locale]
//! currency_suffix = "ج.م"
//! digits = "latin"        # latin | arabic_indic
//! date_style = "arabic"   # arabic | iso
//!
//! [inventory]
//! default_min_stock = 10
//! oversell = "warn"       # warn | reject
//!
//! [invoice]
//! default_tax_bps = 0
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use khalifa_core::format::Locale;
use khalifa_core::{OversellPolicy, Rate, StoreInfo, DEFAULT_MIN_STOCK};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "khalifa.db";

/// File name of the config inside the config directory.
pub const CONFIG_FILE: &str = "khalifa.toml";

// =============================================================================
// Sections
// =============================================================================

/// `[database]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Pool size. One connection serializes all access.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds to wait for a free connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

/// `[inventory]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Low-stock threshold offered for new products.
    #[serde(default = "default_min_stock")]
    pub default_min_stock: i64,

    /// What to do when an invoice sells more than is in stock.
    #[serde(default)]
    pub oversell: OversellPolicy,
}

fn default_min_stock() -> i64 {
    DEFAULT_MIN_STOCK
}

impl Default for InventorySettings {
    fn default() -> Self {
        InventorySettings {
            default_min_stock: default_min_stock(),
            oversell: OversellPolicy::default(),
        }
    }
}

/// `[invoice]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSettings {
    /// Tax rate pre-filled on new drafts, in basis points.
    #[serde(default)]
    pub default_tax_bps: u32,
}

impl InvoiceSettings {
    pub fn default_tax(&self) -> Rate {
        Rate::from_bps(self.default_tax_bps)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    /// Printed at the top of invoices and reports.
    #[serde(default)]
    pub store: StoreInfo,

    #[serde(default)]
    pub locale: Locale,

    #[serde(default)]
    pub inventory: InventorySettings,

    #[serde(default)]
    pub invoice: InvoiceSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (khalifa.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
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

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document. Missing sections take their defaults.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> DbResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DbError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| DbError::Config(e.to_string()))?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.store.name.trim().is_empty() {
            return Err(DbError::Config("store.name must not be empty".into()));
        }

        if self.inventory.default_min_stock < 0 {
            return Err(DbError::Config(
                "inventory.default_min_stock cannot be negative".into(),
            ));
        }

        if self.invoice.default_tax_bps > Rate::FULL_BPS {
            return Err(DbError::Config(format!(
                "invoice.default_tax_bps must be at most {}",
                Rate::FULL_BPS
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("KHALIFA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(name) = std::env::var("KHALIFA_STORE_NAME") {
            self.store.name = name;
        }

        if let Ok(policy) = std::env::var("KHALIFA_OVERSELL") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding oversell policy from environment");
                    self.inventory.oversell = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown oversell policy in environment"),
            }
        }

        if let Ok(tax) = std::env::var("KHALIFA_DEFAULT_TAX") {
            match tax.parse::<Rate>() {
                Ok(rate) => self.invoice.default_tax_bps = rate.bps(),
                Err(_) => warn!(tax = %tax, "Unparseable default tax in environment"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "khalifa", "store")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Database path: configured, else the platform data directory, else
    /// the working directory.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }
        directories::ProjectDirs::from("com", "khalifa", "store")
            .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
    }

    /// Pool configuration derived from `[database]` and `[inventory]`.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path())
            .max_connections(self.database.max_connections)
            .acquire_timeout(Duration::from_secs(self.database.acquire_timeout_secs))
            .oversell(self.inventory.oversell)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
