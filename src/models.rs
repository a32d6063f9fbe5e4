//! Core data types shared across the monitor
//!
//! Threshold and RSI alert keys are explicit composite value types rather
//! than formatted strings, so producers and consumers can never drift on
//! formatting.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Decimal places used when rounding price threshold values into keys
pub const THRESHOLD_KEY_SCALE: u32 = 8;

/// Decimal places used when rounding RSI thresholds into keys
pub const RSI_KEY_SCALE: u32 = 2;

/// Which side of the simulated swap a threshold watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Unique key for a price threshold: (side, value rounded to 8 dp)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThresholdKey {
    pub side: Side,
    pub value: Decimal,
}

impl ThresholdKey {
    /// Build a key, normalizing the value to the key scale
    pub fn new(side: Side, value: Decimal) -> Self {
        Self {
            side,
            value: value.round_dp(THRESHOLD_KEY_SCALE),
        }
    }
}

impl fmt::Display for ThresholdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.side, self.value)
    }
}

/// A configured buy/sell price threshold with its trigger state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceThreshold {
    pub key: ThresholdKey,
    /// Set only by a qualifying trigger; cleared by an explicit reset
    pub last_triggered: Option<DateTime<Utc>>,
}

impl PriceThreshold {
    pub fn new(key: ThresholdKey) -> Self {
        Self {
            key,
            last_triggered: None,
        }
    }
}

/// One sampled price pair from the quoting service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub buy_price: f64,
    pub sell_price: f64,
}

/// Candle interval supported by the chart source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1s")]
    OneSecond,
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
}

impl CandleInterval {
    /// Width of one aggregation bucket
    pub fn duration(&self) -> chrono::Duration {
        match self {
            Self::OneSecond => chrono::Duration::seconds(1),
            Self::OneMinute => chrono::Duration::minutes(1),
            Self::FiveMinutes => chrono::Duration::minutes(5),
            Self::FifteenMinutes => chrono::Duration::minutes(15),
            Self::OneHour => chrono::Duration::hours(1),
            Self::FourHours => chrono::Duration::hours(4),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneSecond => "1s",
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandleInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1s" => Ok(Self::OneSecond),
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinutes),
            "15m" => Ok(Self::FifteenMinutes),
            "1h" => Ok(Self::OneHour),
            "4h" => Ok(Self::FourHours),
            other => Err(format!("Unknown candle interval: {}", other)),
        }
    }
}

/// Direction of an RSI alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsiDirection {
    Above,
    Below,
}

impl fmt::Display for RsiDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above => write!(f, "above"),
            Self::Below => write!(f, "below"),
        }
    }
}

/// Unique key for an RSI alert: (direction, threshold rounded to 2 dp)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RsiAlertKey {
    pub direction: RsiDirection,
    pub threshold: Decimal,
}

impl RsiAlertKey {
    pub fn new(direction: RsiDirection, threshold: Decimal) -> Self {
        Self {
            direction,
            threshold: threshold.round_dp(RSI_KEY_SCALE),
        }
    }
}

impl fmt::Display for RsiAlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:.2}", self.direction, self.threshold)
    }
}

impl FromStr for RsiAlertKey {
    type Err = String;

    /// Parse entries like "above:70" or "below:30.5"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dir, val) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid RSI alert format: {}", s))?;
        let direction = match dir.trim() {
            "above" => RsiDirection::Above,
            "below" => RsiDirection::Below,
            other => return Err(format!("Invalid RSI alert direction: {}", other)),
        };
        let threshold = Decimal::from_str(val.trim())
            .map_err(|_| format!("Invalid RSI alert threshold: {}", val))?;
        Ok(Self::new(direction, threshold))
    }
}

/// RSI engine configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RsiConfig {
    pub interval: CandleInterval,
    /// When false, a triggered alert only clears on explicit manual reset
    pub reset_enabled: bool,
}

/// A published RSI value for the latest closed candle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsiReading {
    pub value: f64,
    pub candle_time: DateTime<Utc>,
    pub interval: CandleInterval,
    pub computed_at: DateTime<Utc>,
}

/// Per-wallet PnL record as returned by the analytics service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletPnlRecord {
    pub holding: f64,
    pub realized: f64,
    pub unrealized: f64,
    pub current_value: f64,
    pub cost_basis: f64,
    /// Raw trade time string from the service; parsed lazily for aggregation
    pub last_trade_time: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl WalletPnlRecord {
    /// True when every numeric field is zero and no trade history exists.
    /// Part of the staleness heuristic; a genuinely empty wallet also
    /// matches, which is accepted behavior.
    pub fn is_empty_shape(&self) -> bool {
        self.holding == 0.0
            && self.realized == 0.0
            && self.unrealized == 0.0
            && self.current_value == 0.0
            && self.cost_basis == 0.0
            && self.last_trade_time.is_none()
    }
}

/// Aggregate PnL across the full wallet set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatePnl {
    pub holding: f64,
    pub realized: f64,
    pub unrealized: f64,
    pub current_value: f64,
    /// Weighted by holding; 0 when total holding is 0
    pub cost_basis: f64,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub stale_count: usize,
    pub stale_wallets: Vec<String>,
    pub failed_wallets: Vec<String>,
}

/// Completed aggregation run: per-wallet records plus the derived aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlSnapshot {
    pub per_wallet: BTreeMap<String, WalletPnlRecord>,
    pub aggregate: AggregatePnl,
    pub refreshed_at: DateTime<Utc>,
}
