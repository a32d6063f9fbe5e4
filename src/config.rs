//! Configuration management for Quotewatch
//!
//! Loads configuration from YAML files and environment variables.
//! Environment variables override YAML values.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::models::CandleInterval;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Simulated swap quoting configuration
    pub quote: QuoteConfig,
    /// Buy/sell threshold alert configuration
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// RSI engine configuration
    #[serde(default)]
    pub rsi: RsiSectionConfig,
    /// Wallet PnL aggregation configuration
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Display configuration (presentation only)
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Price-quoting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteConfig {
    /// Source asset identifier (the USD-pegged mint the notional is priced in)
    pub input_mint: String,
    /// Tracked token mint
    pub output_mint: String,
    /// Simulated trade size in USD
    #[serde(default = "default_usd_amount")]
    pub usd_amount: f64,
    /// Price poll interval in seconds
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Quote API base URL
    #[serde(default = "default_quote_api_url")]
    pub api_url: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_http_timeout")]
    pub timeout_ms: u64,
}

fn default_usd_amount() -> f64 {
    100.0
}

fn default_check_interval() -> u64 {
    60
}

fn default_quote_api_url() -> String {
    "https://quote-api.jup.ag/v6".to_string()
}

fn default_http_timeout() -> u64 {
    10_000
}

/// Threshold alert configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertsConfig {
    /// Initial buy thresholds (decimal strings, e.g. "0.00135")
    #[serde(default)]
    pub buy: Vec<String>,
    /// Initial sell thresholds
    #[serde(default)]
    pub sell: Vec<String>,
    /// Minutes before a fired alert re-arms; 0 means never re-arm automatically
    #[serde(default)]
    pub reset_minutes: u32,
    /// ntfy topic; notifications are disabled when empty
    #[serde(default)]
    pub ntfy_topic: String,
    /// ntfy server URL
    #[serde(default = "default_ntfy_server")]
    pub ntfy_server: String,
}

fn default_ntfy_server() -> String {
    "https://ntfy.sh".to_string()
}

/// RSI engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RsiSectionConfig {
    /// Candle interval for the RSI series
    #[serde(default = "default_rsi_interval")]
    pub interval: CandleInterval,
    /// RSI refresh cadence in minutes (independent of the price poll)
    #[serde(default = "default_rsi_check_interval")]
    pub check_interval_mins: u64,
    /// Initial RSI alerts ("above:70", "below:30")
    #[serde(default)]
    pub alerts: Vec<String>,
    /// Whether triggered alerts auto-clear once the level is crossed back
    #[serde(default)]
    pub reset_enabled: bool,
    /// Chart API key; the RSI subsystem is disabled when absent
    #[serde(default)]
    pub api_key: Option<String>,
    /// Chart API base URL
    #[serde(default = "default_tracker_api_url")]
    pub api_url: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_http_timeout")]
    pub timeout_ms: u64,
}

fn default_rsi_interval() -> CandleInterval {
    CandleInterval::OneSecond
}

fn default_rsi_check_interval() -> u64 {
    5
}

fn default_tracker_api_url() -> String {
    "https://data.solanatracker.io".to_string()
}

impl Default for RsiSectionConfig {
    fn default() -> Self {
        Self {
            interval: default_rsi_interval(),
            check_interval_mins: default_rsi_check_interval(),
            alerts: Vec::new(),
            reset_enabled: false,
            api_key: None,
            api_url: default_tracker_api_url(),
            timeout_ms: default_http_timeout(),
        }
    }
}

/// Wallet PnL aggregation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioConfig {
    /// Wallet addresses to aggregate
    #[serde(default)]
    pub wallets: Vec<String>,
    /// Analytics API key; the PnL subsystem is disabled when absent
    #[serde(default)]
    pub api_key: Option<String>,
    /// Analytics API base URL
    #[serde(default = "default_tracker_api_url")]
    pub api_url: String,
    /// Minimum spacing between per-wallet requests (rate-limit pacing)
    #[serde(default = "default_request_spacing")]
    pub min_request_spacing_ms: u64,
    /// Backoff before retrying the failed subset
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Scheduled refresh cadence in minutes; 0 disables the scheduler
    /// (refreshes then happen only on demand)
    #[serde(default = "default_pnl_refresh_interval")]
    pub refresh_interval_mins: u64,
    /// Request timeout in milliseconds
    #[serde(default = "default_http_timeout")]
    pub timeout_ms: u64,
}

fn default_request_spacing() -> u64 {
    1100
}

fn default_retry_backoff() -> u64 {
    2000
}

fn default_pnl_refresh_interval() -> u64 {
    15
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            wallets: Vec::new(),
            api_key: None,
            api_url: default_tracker_api_url(),
            min_request_spacing_ms: default_request_spacing(),
            retry_backoff_ms: default_retry_backoff(),
            refresh_interval_mins: default_pnl_refresh_interval(),
            timeout_ms: default_http_timeout(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/quotewatch.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// IANA time zone used only when rendering timestamps for the UI.
    /// Trigger-time comparisons always use absolute UTC instants.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (QUOTEWATCH_*)
    /// 2. config/config.yaml (if exists)
    /// 3. config.yaml (if exists)
    /// 4. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("database.path", "data/quotewatch.db")?
            .set_default("database.max_connections", 5)?
            .set_default("quote.usd_amount", 100.0)?
            .set_default("quote.check_interval_secs", 60)?
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/config").required(false))
            // QUOTEWATCH_QUOTE__CHECK_INTERVAL_SECS=30 -> quote.check_interval_secs = 30
            .add_source(
                Environment::with_prefix("QUOTEWATCH")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quote.input_mint.is_empty() || self.quote.output_mint.is_empty() {
            return Err(ConfigError::Message(
                "quote.input_mint and quote.output_mint must be set".to_string(),
            ));
        }

        if self.quote.usd_amount <= 0.0 {
            return Err(ConfigError::Message(
                "quote.usd_amount must be positive".to_string(),
            ));
        }

        if self.quote.check_interval_secs == 0 {
            return Err(ConfigError::Message(
                "quote.check_interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.rsi.check_interval_mins == 0 {
            return Err(ConfigError::Message(
                "rsi.check_interval_mins must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
