//! # Ledger Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TAMBO_STORE_NAME="Tambo Surquillo"                                 │
//! │     TAMBO_UTC_OFFSET=-05:00                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tambo-pos/ledger.toml (Linux)                            │
//! │     ~/Library/Application Support/pe.tambo.pos/ledger.toml (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Peru (UTC-5), 3 commit attempts, 58mm paper                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # ledger.toml
//! [store]
//! name = "Tambo Surquillo"
//! address_lines = ["Av. Angamos 1234", "Lima"]
//! currency_symbol = "S/"
//!
//! [business_day]
//! utc_offset = "-05:00"
//!
//! [ledger]
//! max_commit_attempts = 3
//! replay_interval_secs = 15
//! journal_offline_sales = true
//!
//! [limits]
//! sales_per_window = 1
//! sale_window_ms = 800
//!
//! [cache]
//! product_ttl_secs = 300
//! session_ttl_secs = 30
//!
//! [printer]
//! paper_width = 32
//!
//! [database]
//! path = "/var/lib/tambo/tambo.db"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use tambo_core::ticket::MIN_PAPER_WIDTH;
use tambo_core::{BusinessDayResolver, StoreHeader};

/// Widest supported paper (80mm, condensed font).
pub const MAX_PAPER_WIDTH: usize = 48;

// =============================================================================
// Store
// =============================================================================

/// What gets printed at the top of each ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_store_name")]
    pub name: String,

    #[serde(default)]
    pub address_lines: Vec<String>,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// Last line of each ticket.
    #[serde(default = "default_footer")]
    pub footer: Option<String>,
}

fn default_store_name() -> String {
    "Tambo".to_string()
}

fn default_currency_symbol() -> String {
    "S/".to_string()
}

fn default_footer() -> Option<String> {
    Some("Gracias por su compra".to_string())
}

impl Default for StoreSection {
    fn default() -> Self {
        StoreSection {
            name: default_store_name(),
            address_lines: Vec::new(),
            currency_symbol: default_currency_symbol(),
            footer: default_footer(),
        }
    }
}

// =============================================================================
// Business Day
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDaySection {
    /// Fixed offset of the store's local time. No DST.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

fn default_utc_offset() -> String {
    "-05:00".to_string()
}

impl Default for BusinessDaySection {
    fn default() -> Self {
        BusinessDaySection {
            utc_offset: default_utc_offset(),
        }
    }
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Read-modify-write attempts on a version conflict before giving up.
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,

    /// Seconds between replay passes over the offline queue.
    #[serde(default = "default_replay_interval")]
    pub replay_interval_secs: u64,

    /// Also keep queued sales in the local `pending_sales` table.
    #[serde(default = "default_true")]
    pub journal_offline_sales: bool,

    /// Journaled sales loaded per replay pass.
    #[serde(default = "default_replay_batch_size")]
    pub replay_batch_size: u32,
}

fn default_max_commit_attempts() -> u32 {
    3
}

fn default_replay_interval() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_replay_batch_size() -> u32 {
    100
}

impl Default for LedgerSection {
    fn default() -> Self {
        LedgerSection {
            max_commit_attempts: default_max_commit_attempts(),
            replay_interval_secs: default_replay_interval(),
            journal_offline_sales: default_true(),
            replay_batch_size: default_replay_batch_size(),
        }
    }
}

// =============================================================================
// Limits & Cache
// =============================================================================

/// Per-operator guard against double-clicked "Cobrar".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_sales_per_window")]
    pub sales_per_window: usize,

    #[serde(default = "default_sale_window_ms")]
    pub sale_window_ms: u64,
}

fn default_sales_per_window() -> usize {
    1
}

fn default_sale_window_ms() -> u64 {
    800
}

impl Default for LimitsSection {
    fn default() -> Self {
        LimitsSection {
            sales_per_window: default_sales_per_window(),
            sale_window_ms: default_sale_window_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_product_ttl")]
    pub product_ttl_secs: u64,

    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

fn default_product_ttl() -> u64 {
    300
}

fn default_session_ttl() -> u64 {
    30
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            product_ttl_secs: default_product_ttl(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

// =============================================================================
// Printer & Database
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterSection {
    /// Characters per line: 32 (58mm), 42 or 48 (80mm).
    #[serde(default = "default_paper_width")]
    pub paper_width: usize,
}

fn default_paper_width() -> usize {
    32
}

impl Default for PrinterSection {
    fn default() -> Self {
        PrinterSection {
            paper_width: default_paper_width(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// SQLite file. Defaults to `tambo.db` in the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub business_day: BusinessDaySection,

    #[serde(default)]
    pub ledger: LedgerSection,

    #[serde(default)]
    pub limits: LimitsSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub printer: PrinterSection,

    #[serde(default)]
    pub database: DatabaseSection,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (ledger.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_toml(contents: &str) -> LedgerResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> LedgerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LedgerError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LedgerResult<()> {
        self.resolver()?;

        if self.store.name.trim().is_empty() {
            return Err(LedgerError::Config("store.name must not be empty".into()));
        }

        if self.ledger.max_commit_attempts == 0 {
            return Err(LedgerError::Config(
                "ledger.max_commit_attempts must be greater than 0".into(),
            ));
        }

        if self.ledger.replay_interval_secs == 0 {
            return Err(LedgerError::Config(
                "ledger.replay_interval_secs must be greater than 0".into(),
            ));
        }

        if self.ledger.replay_batch_size == 0 {
            return Err(LedgerError::Config(
                "ledger.replay_batch_size must be greater than 0".into(),
            ));
        }

        if self.limits.sales_per_window == 0 {
            return Err(LedgerError::Config(
                "limits.sales_per_window must be greater than 0".into(),
            ));
        }

        let width = self.printer.paper_width;
        if !(MIN_PAPER_WIDTH..=MAX_PAPER_WIDTH).contains(&width) {
            return Err(LedgerError::Config(format!(
                "printer.paper_width must be between {} and {}, got {}",
                MIN_PAPER_WIDTH, MAX_PAPER_WIDTH, width
            )));
        }

        Ok(())
    }

    /// Applies `TAMBO_*` overrides read through `lookup`.
    ///
    /// Values that do not parse are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("TAMBO_STORE_NAME") {
            debug!(name = %name, "Overriding store name from environment");
            self.store.name = name;
        }

        if let Some(offset) = lookup("TAMBO_UTC_OFFSET") {
            debug!(offset = %offset, "Overriding UTC offset from environment");
            self.business_day.utc_offset = offset;
        }

        if let Some(path) = lookup("TAMBO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(journal) = lookup("TAMBO_JOURNAL_OFFLINE") {
            match journal.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.ledger.journal_offline_sales = true,
                "0" | "false" | "no" | "off" => self.ledger.journal_offline_sales = false,
                _ => warn!(value = %journal, "Unknown TAMBO_JOURNAL_OFFLINE value"),
            }
        }

        override_parsed(&lookup, "TAMBO_MAX_COMMIT_ATTEMPTS", &mut self.ledger.max_commit_attempts);
        override_parsed(&lookup, "TAMBO_REPLAY_INTERVAL_SECS", &mut self.ledger.replay_interval_secs);
        override_parsed(&lookup, "TAMBO_SALES_PER_WINDOW", &mut self.limits.sales_per_window);
        override_parsed(&lookup, "TAMBO_SALE_WINDOW_MS", &mut self.limits.sale_window_ms);
        override_parsed(&lookup, "TAMBO_PAPER_WIDTH", &mut self.printer.paper_width);
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("pe", "tambo", "pos")
            .map(|dirs| dirs.config_dir().join("ledger.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn resolver(&self) -> LedgerResult<BusinessDayResolver> {
        BusinessDayResolver::from_offset_str(&self.business_day.utc_offset).map_err(|e| {
            LedgerError::Config(format!(
                "business_day.utc_offset {:?}: {}",
                self.business_day.utc_offset, e
            ))
        })
    }

    pub fn store_header(&self) -> StoreHeader {
        StoreHeader {
            name: self.store.name.clone(),
            address_lines: self.store.address_lines.clone(),
            currency_symbol: self.store.currency_symbol.clone(),
            footer: self.store.footer.clone(),
        }
    }

    /// The configured database file, or `tambo.db` in the data directory.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.path.clone().or_else(|| {
            directories::ProjectDirs::from("pe", "tambo", "pos")
                .map(|dirs| dirs.data_dir().join("tambo.db"))
        })
    }

    pub fn sale_window(&self) -> Duration {
        Duration::from_millis(self.limits.sale_window_ms)
    }

    pub fn replay_interval(&self) -> Duration {
        Duration::from_secs(self.ledger.replay_interval_secs)
    }

    pub fn product_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.product_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.session_ttl_secs)
    }
}

fn override_parsed<F, T>(lookup: &F, name: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Debug,
{
    let Some(raw) = lookup(name) else { return };
    match raw.trim().parse::<T>() {
        Ok(value) => {
            debug!(name, ?value, "Overriding from environment");
            *target = value;
        }
        Err(_) => warn!(name, value = %raw, "Ignoring unparsable environment override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.business_day.utc_offset, "-05:00");
        assert_eq!(config.ledger.max_commit_attempts, 3);
        assert_eq!(config.printer.paper_width, 32);
        assert_eq!(config.resolver().unwrap(), BusinessDayResolver::peru());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml(
            r#"
            [store]
            name = "Tambo Surquillo"
            address_lines = ["Av. Angamos 1234"]

            [printer]
            paper_width = 42
            "#,
        )
        .unwrap();

        assert_eq!(config.store.name, "Tambo Surquillo");
        assert_eq!(config.store.currency_symbol, "S/");
        assert_eq!(config.printer.paper_width, 42);
        assert_eq!(config.cache.product_ttl_secs, 300);
        assert_eq!(config.store_header().address_lines, vec!["Av. Angamos 1234"]);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TAMBO_STORE_NAME", "Tambo Miraflores"),
            ("TAMBO_MAX_COMMIT_ATTEMPTS", "5"),
            ("TAMBO_PAPER_WIDTH", "ancho"),
            ("TAMBO_JOURNAL_OFFLINE", "off"),
        ]
        .into_iter()
        .collect();

        let mut config = LedgerConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.store.name, "Tambo Miraflores");
        assert_eq!(config.ledger.max_commit_attempts, 5);
        assert_eq!(config.printer.paper_width, 32);
        assert!(!config.ledger.journal_offline_sales);
    }

    #[test]
    fn test_validation() {
        let mut config = LedgerConfig::default();
        config.business_day.utc_offset = "Lima".into();
        assert!(matches!(config.validate(), Err(LedgerError::Config(_))));

        let mut config = LedgerConfig::default();
        config.ledger.max_commit_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.printer.paper_width = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("tambo-ledger-{}", uuid::Uuid::new_v4()))
            .join("ledger.toml");

        let mut config = LedgerConfig::default();
        config.store.name = "Tambo Barranco".into();
        config.limits.sale_window_ms = 1500;
        config.save(Some(path.clone())).unwrap();

        let loaded = LedgerConfig::from_toml(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&LedgerConfig::default()).unwrap();
        assert!(toml_str.contains("[business_day]"));
        assert!(toml_str.contains("[ledger]"));
    }
}
