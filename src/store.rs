//! Shared monitor state with synchronized accessors and durable persistence
//!
//! `MonitorStore` owns every piece of mutable state: price history, threshold
//! sets with trigger timestamps, the global cooldown, wallet list, RSI
//! config/alerts, the published RSI reading, and the PnL snapshot. All
//! mutators take the single write lock for the full read-modify-write, so
//! concurrent evaluation and mutation can never interleave to produce
//! duplicate or lost triggers.
//!
//! State is written through to SQLite as three JSON documents and reloaded
//! on startup; absent documents fall back to the configured defaults.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::prelude::*;
use std::collections::{BTreeMap, VecDeque};
use std::str::FromStr;

use crate::config::AppConfig;
use crate::db::{self, DbPool, DOC_ALERT_STATE, DOC_PNL, DOC_SETTINGS};
use crate::error::{AppError, AppResult};
use crate::models::{
    CandleInterval, PnlSnapshot, PriceSample, PriceThreshold, RsiAlertKey, RsiConfig, RsiReading,
    Side, ThresholdKey, WalletPnlRecord,
};
use crate::thresholds::{self, TriggeredThreshold};

/// Maximum retained price samples; oldest are evicted first
pub const PRICE_HISTORY_CAP: usize = 100;

/// In-memory state guarded by the store lock
struct StoreInner {
    usd_amount: f64,
    reset_minutes: u32,
    price_history: VecDeque<PriceSample>,
    thresholds: BTreeMap<ThresholdKey, PriceThreshold>,
    wallets: Vec<String>,
    tracked_mint: String,
    rsi_config: RsiConfig,
    rsi_alerts: BTreeMap<RsiAlertKey, bool>,
    rsi_reading: Option<RsiReading>,
    /// Bumped on every interval switch; readings from older epochs are
    /// discarded instead of published
    rsi_epoch: u64,
    pnl: Option<PnlSnapshot>,
    /// Subsystems without a configured credential never run; readers can
    /// tell this apart from a temporarily unavailable value
    rsi_enabled: bool,
    pnl_enabled: bool,
}

/// Persisted runtime settings document
#[derive(serde::Serialize, serde::Deserialize)]
struct SettingsDoc {
    usd_amount: f64,
    reset_minutes: u32,
    rsi: RsiConfig,
    wallets: Vec<String>,
}

/// Persisted alert/trigger state document
#[derive(serde::Serialize, serde::Deserialize)]
struct AlertStateDoc {
    price_history: Vec<PriceSample>,
    thresholds: Vec<PriceThreshold>,
    rsi_alerts: Vec<(RsiAlertKey, bool)>,
}

/// Full read snapshot for the API/UI layer
#[derive(Debug, Clone, serde::Serialize)]
pub struct StateSnapshot {
    pub usd_amount: f64,
    pub reset_minutes: u32,
    pub tracked_mint: String,
    pub price_history: Vec<PriceSample>,
    pub thresholds: Vec<PriceThreshold>,
    pub wallets: Vec<String>,
    pub rsi_config: RsiConfig,
    pub rsi_alerts: Vec<(RsiAlertKey, bool)>,
    /// `None` with `rsi_enabled` set means temporarily unavailable;
    /// `rsi_enabled` false means the subsystem never runs
    pub rsi_reading: Option<RsiReading>,
    pub rsi_enabled: bool,
    pub pnl: Option<PnlSnapshot>,
    pub pnl_enabled: bool,
}

/// Shared, synchronized state store
pub struct MonitorStore {
    inner: RwLock<StoreInner>,
    pool: DbPool,
}

impl MonitorStore {
    /// Build the store from config defaults, then overlay any persisted state
    pub async fn load(pool: DbPool, config: &AppConfig) -> AppResult<Self> {
        let mut thresholds = BTreeMap::new();
        for (side, raw_values) in [
            (Side::Buy, &config.alerts.buy),
            (Side::Sell, &config.alerts.sell),
        ] {
            for raw in raw_values {
                match Decimal::from_str(raw.trim()) {
                    Ok(value) if value > Decimal::ZERO => {
                        let key = ThresholdKey::new(side, value);
                        thresholds.entry(key).or_insert_with(|| PriceThreshold::new(key));
                    }
                    _ => {
                        tracing::warn!(side = %side, value = %raw, "Skipping malformed threshold in config");
                    }
                }
            }
        }

        let mut rsi_alerts = BTreeMap::new();
        for raw in &config.rsi.alerts {
            match RsiAlertKey::from_str(raw) {
                Ok(key) => {
                    rsi_alerts.entry(key).or_insert(false);
                }
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "Skipping malformed RSI alert in config");
                }
            }
        }

        let mut inner = StoreInner {
            usd_amount: config.quote.usd_amount,
            reset_minutes: config.alerts.reset_minutes,
            price_history: VecDeque::with_capacity(PRICE_HISTORY_CAP),
            thresholds,
            wallets: dedupe_preserving_order(&config.portfolio.wallets),
            tracked_mint: config.quote.output_mint.clone(),
            rsi_config: RsiConfig {
                interval: config.rsi.interval,
                reset_enabled: config.rsi.reset_enabled,
            },
            rsi_alerts,
            rsi_reading: None,
            rsi_epoch: 0,
            pnl: None,
            rsi_enabled: has_credential(&config.rsi.api_key),
            pnl_enabled: has_credential(&config.portfolio.api_key),
        };

        // Overlay persisted state from previous runs
        if let Some(settings) = db::load_document::<SettingsDoc>(&pool, DOC_SETTINGS).await? {
            inner.usd_amount = settings.usd_amount;
            inner.reset_minutes = settings.reset_minutes;
            inner.rsi_config = settings.rsi;
            inner.wallets = dedupe_preserving_order(&settings.wallets);
        }

        if let Some(state) = db::load_document::<AlertStateDoc>(&pool, DOC_ALERT_STATE).await? {
            inner.price_history = state.price_history.into_iter().collect();
            inner.thresholds = state
                .thresholds
                .into_iter()
                .map(|t| (t.key, t))
                .collect();
            inner.rsi_alerts = state.rsi_alerts.into_iter().collect();
        }

        if let Some(pnl) = db::load_document::<PnlSnapshot>(&pool, DOC_PNL).await? {
            inner.pnl = Some(pnl);
        }

        tracing::info!(
            thresholds = inner.thresholds.len(),
            rsi_alerts = inner.rsi_alerts.len(),
            wallets = inner.wallets.len(),
            samples = inner.price_history.len(),
            "Monitor state loaded"
        );

        Ok(Self {
            inner: RwLock::new(inner),
            pool,
        })
    }

    /// Full state snapshot for readers
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.read();
        StateSnapshot {
            usd_amount: inner.usd_amount,
            reset_minutes: inner.reset_minutes,
            tracked_mint: inner.tracked_mint.clone(),
            price_history: inner.price_history.iter().cloned().collect(),
            thresholds: inner.thresholds.values().cloned().collect(),
            wallets: inner.wallets.clone(),
            rsi_config: inner.rsi_config,
            rsi_alerts: inner.rsi_alerts.iter().map(|(k, v)| (*k, *v)).collect(),
            rsi_reading: inner.rsi_reading.clone(),
            rsi_enabled: inner.rsi_enabled,
            pnl: inner.pnl.clone(),
            pnl_enabled: inner.pnl_enabled,
        }
    }

    /// Simulated trade size in USD
    pub fn usd_amount(&self) -> f64 {
        self.inner.read().usd_amount
    }

    /// Tracked token mint
    pub fn tracked_mint(&self) -> String {
        self.inner.read().tracked_mint.clone()
    }

    /// Wallet set in insertion order
    pub fn wallets(&self) -> Vec<String> {
        self.inner.read().wallets.clone()
    }

    /// Append a sample and evaluate every threshold against it in one
    /// serialized step. Returns the thresholds that fired.
    ///
    /// A persistence failure is logged, never surfaced: the in-memory
    /// triggers already stand, so suppressing the fired list would drop
    /// their notifications while the latch stays set.
    pub async fn ingest_sample(
        &self,
        sample: PriceSample,
        now: DateTime<Utc>,
    ) -> Vec<TriggeredThreshold> {
        let fired = {
            let mut inner = self.inner.write();
            inner.price_history.push_back(sample.clone());
            while inner.price_history.len() > PRICE_HISTORY_CAP {
                inner.price_history.pop_front();
            }
            let reset_minutes = inner.reset_minutes;
            thresholds::evaluate_sample(&mut inner.thresholds, &sample, reset_minutes, now)
        };

        if let Err(e) = self.persist_alert_state().await {
            tracing::error!(error = %e, "Failed to persist alert state after sample");
        }
        fired
    }

    /// Update the notional USD amount; clears the price history since the
    /// chart becomes incomparable across notional changes
    pub async fn set_usd_amount(&self, amount: f64) -> AppResult<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::Validation(
                "USD amount must be positive".to_string(),
            ));
        }

        {
            let mut inner = self.inner.write();
            inner.usd_amount = amount;
            inner.price_history.clear();
        }
        self.persist_settings().await?;
        self.persist_alert_state().await
    }

    /// Update the global cooldown in minutes (0 disables automatic re-arm)
    pub async fn set_reset_minutes(&self, minutes: u32) -> AppResult<()> {
        self.inner.write().reset_minutes = minutes;
        self.persist_settings().await
    }

    /// Add thresholds for one side; re-adding an existing key is a no-op
    pub async fn add_thresholds(&self, side: Side, values: &[Decimal]) -> AppResult<()> {
        for value in values {
            if *value <= Decimal::ZERO {
                return Err(AppError::Validation(format!(
                    "Threshold value must be positive, got {}",
                    value
                )));
            }
        }

        {
            let mut inner = self.inner.write();
            for value in values {
                let key = ThresholdKey::new(side, *value);
                inner
                    .thresholds
                    .entry(key)
                    .or_insert_with(|| PriceThreshold::new(key));
            }
        }
        self.persist_alert_state().await
    }

    /// Remove a threshold; returns false (no-op) when the key is absent
    pub async fn remove_threshold(&self, key: ThresholdKey) -> AppResult<bool> {
        let removed = self.inner.write().thresholds.remove(&key).is_some();
        if removed {
            self.persist_alert_state().await?;
        }
        Ok(removed)
    }

    /// Clear `last_triggered` for a threshold, re-arming it immediately
    /// regardless of the cooldown setting
    pub async fn reset_threshold(&self, key: ThresholdKey) -> AppResult<bool> {
        let reset = {
            let mut inner = self.inner.write();
            match inner.thresholds.get_mut(&key) {
                Some(threshold) => {
                    threshold.last_triggered = None;
                    true
                }
                None => false,
            }
        };
        if reset {
            self.persist_alert_state().await?;
        }
        Ok(reset)
    }

    /// Add a wallet address; returns false when it is already present
    pub async fn add_wallet(&self, address: &str) -> AppResult<bool> {
        let address = address.trim();
        if !is_plausible_address(address) {
            return Err(AppError::Validation(format!(
                "Malformed wallet address: {}",
                address
            )));
        }

        let added = {
            let mut inner = self.inner.write();
            if inner.wallets.iter().any(|w| w == address) {
                false
            } else {
                inner.wallets.push(address.to_string());
                true
            }
        };
        if added {
            self.persist_settings().await?;
        }
        Ok(added)
    }

    /// Current RSI refresh target: (epoch, interval)
    pub fn rsi_target(&self) -> (u64, CandleInterval) {
        let inner = self.inner.read();
        (inner.rsi_epoch, inner.rsi_config.interval)
    }

    /// Current RSI configuration
    pub fn rsi_config(&self) -> RsiConfig {
        self.inner.read().rsi_config
    }

    /// Switch the candle interval. Discards the published reading and bumps
    /// the epoch so in-flight readings for the old interval are dropped;
    /// readers see "unavailable" until a series for the new interval exists.
    pub async fn set_rsi_interval(&self, interval: CandleInterval) -> AppResult<()> {
        {
            let mut inner = self.inner.write();
            if inner.rsi_config.interval != interval {
                inner.rsi_config.interval = interval;
                inner.rsi_epoch += 1;
                inner.rsi_reading = None;
            }
        }
        self.persist_settings().await
    }

    /// Toggle automatic RSI alert re-arm; affects only future transitions
    pub async fn set_rsi_reset_enabled(&self, enabled: bool) -> AppResult<()> {
        self.inner.write().rsi_config.reset_enabled = enabled;
        self.persist_settings().await
    }

    /// Add RSI alerts; existing keys keep their triggered state
    pub async fn add_rsi_alerts(&self, keys: &[RsiAlertKey]) -> AppResult<()> {
        {
            let mut inner = self.inner.write();
            for key in keys {
                inner.rsi_alerts.entry(*key).or_insert(false);
            }
        }
        self.persist_alert_state().await
    }

    /// Remove an RSI alert; returns false when the key is absent
    pub async fn remove_rsi_alert(&self, key: RsiAlertKey) -> AppResult<bool> {
        let removed = self.inner.write().rsi_alerts.remove(&key).is_some();
        if removed {
            self.persist_alert_state().await?;
        }
        Ok(removed)
    }

    /// Manually clear an RSI alert's triggered flag
    pub async fn reset_rsi_alert(&self, key: RsiAlertKey) -> AppResult<bool> {
        let reset = {
            let mut inner = self.inner.write();
            match inner.rsi_alerts.get_mut(&key) {
                Some(triggered) => {
                    *triggered = false;
                    true
                }
                None => false,
            }
        };
        if reset {
            self.persist_alert_state().await?;
        }
        Ok(reset)
    }

    /// Publish an RSI reading and apply alert transitions atomically.
    ///
    /// Returns `None` when `epoch` is stale (the interval changed while the
    /// reading was being computed); the reading is discarded in that case.
    /// A persistence failure is logged, never surfaced: transitions already
    /// flipped in memory and their notifications must not be dropped.
    pub async fn apply_rsi_reading(
        &self,
        epoch: u64,
        reading: RsiReading,
    ) -> Option<Vec<RsiAlertKey>> {
        let newly_triggered = {
            let mut inner = self.inner.write();
            if inner.rsi_epoch != epoch {
                return None;
            }
            let reset_enabled = inner.rsi_config.reset_enabled;
            let rsi = reading.value;
            inner.rsi_reading = Some(reading);
            crate::rsi::evaluate_transitions(&mut inner.rsi_alerts, rsi, reset_enabled)
        };

        if let Err(e) = self.persist_alert_state().await {
            tracing::error!(error = %e, "Failed to persist alert state after RSI reading");
        }
        Some(newly_triggered)
    }

    /// Mark the RSI value unavailable after a failed refresh cycle.
    /// Alert triggered flags stay untouched.
    pub fn clear_rsi_reading(&self, epoch: u64) {
        let mut inner = self.inner.write();
        if inner.rsi_epoch == epoch {
            inner.rsi_reading = None;
        }
    }

    /// Latest published RSI reading, if any
    pub fn rsi_reading(&self) -> Option<RsiReading> {
        self.inner.read().rsi_reading.clone()
    }

    /// Cached record for one wallet from the last completed snapshot
    pub fn cached_pnl_record(&self, address: &str) -> Option<WalletPnlRecord> {
        let inner = self.inner.read();
        inner
            .pnl
            .as_ref()
            .and_then(|snapshot| snapshot.per_wallet.get(address).cloned())
    }

    /// Overwrite the PnL snapshot wholesale; readers between refreshes only
    /// ever observe a completed snapshot
    pub async fn store_pnl_snapshot(&self, snapshot: PnlSnapshot) -> AppResult<()> {
        self.inner.write().pnl = Some(snapshot.clone());
        db::save_document(&self.pool, DOC_PNL, &snapshot).await
    }

    /// Latest completed PnL snapshot
    pub fn pnl_snapshot(&self) -> Option<PnlSnapshot> {
        self.inner.read().pnl.clone()
    }

    async fn persist_settings(&self) -> AppResult<()> {
        let doc = {
            let inner = self.inner.read();
            SettingsDoc {
                usd_amount: inner.usd_amount,
                reset_minutes: inner.reset_minutes,
                rsi: inner.rsi_config,
                wallets: inner.wallets.clone(),
            }
        };
        db::save_document(&self.pool, DOC_SETTINGS, &doc).await
    }

    async fn persist_alert_state(&self) -> AppResult<()> {
        let doc = {
            let inner = self.inner.read();
            AlertStateDoc {
                price_history: inner.price_history.iter().cloned().collect(),
                thresholds: inner.thresholds.values().cloned().collect(),
                rsi_alerts: inner.rsi_alerts.iter().map(|(k, v)| (*k, *v)).collect(),
            }
        };
        db::save_document(&self.pool, DOC_ALERT_STATE, &doc).await
    }
}

fn has_credential(api_key: &Option<String>) -> bool {
    api_key.as_deref().map_or(false, |k| !k.is_empty())
}

fn dedupe_preserving_order(addresses: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for address in addresses {
        let address = address.trim();
        if !address.is_empty() && !seen.iter().any(|s: &String| s == address) {
            seen.push(address.to_string());
        }
    }
    seen
}

/// Base58 shape check for Solana-style addresses
fn is_plausible_address(address: &str) -> bool {
    const BASE58: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58.contains(c))
}
