//! Quotewatch Library
//!
//! Token price monitor built on simulated swap quotes, with threshold
//! alerts, a Wilder RSI engine, and multi-wallet PnL aggregation.
//! This library exposes core modules for testing.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notifications;
pub mod portfolio;
pub mod quote;
pub mod rsi;
pub mod sampler;
pub mod store;
pub mod thresholds;

// Re-export commonly used types for tests
pub use config::AppConfig;
pub use db::DbPool;
pub use error::{AppError, AppResult};
pub use models::{
    AggregatePnl, CandleInterval, PnlSnapshot, PriceSample, PriceThreshold, RsiAlertKey,
    RsiDirection, RsiReading, Side, ThresholdKey, WalletPnlRecord,
};
pub use notifications::{CompositeNotifier, NotificationEvent};
pub use portfolio::{AggregatorConfig, PnlAggregator, PortfolioService};
pub use quote::QuoteService;
pub use rsi::{CandleSource, DEFAULT_PERIOD};
pub use store::{MonitorStore, StateSnapshot, PRICE_HISTORY_CAP};
