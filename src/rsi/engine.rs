//! RSI alert transitions and the periodic refresh task
//!
//! The refresh task rebuilds the candle series wholesale each cycle for
//! whatever interval is currently configured, computes the latest
//! closed-candle RSI, and applies alert transitions through the store under
//! its lock. An epoch guard ensures a reading computed for one interval is
//! never published after a switch to another.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::candles::{Candle, CandleSource};
use super::wilder;
use crate::models::{CandleInterval, RsiAlertKey, RsiDirection, RsiReading};
use crate::notifications::{CompositeNotifier, NotificationEvent};
use crate::store::MonitorStore;

/// Apply one RSI observation to the alert map, flipping `triggered` flags
/// per the transition rules. Returns the keys that newly triggered.
///
/// Above: false -> true when `rsi >= threshold`; true -> false only when
/// `reset_enabled` and `rsi < threshold` is later observed. Below mirrors.
/// With `reset_enabled = false` a triggered flag only clears on manual reset.
pub fn evaluate_transitions(
    alerts: &mut BTreeMap<RsiAlertKey, bool>,
    rsi: f64,
    reset_enabled: bool,
) -> Vec<RsiAlertKey> {
    let rsi = match Decimal::from_f64_retain(rsi) {
        Some(v) => v,
        None => return Vec::new(),
    };

    let mut newly_triggered = Vec::new();

    for (key, triggered) in alerts.iter_mut() {
        let condition = match key.direction {
            RsiDirection::Above => rsi >= key.threshold,
            RsiDirection::Below => rsi <= key.threshold,
        };

        if condition && !*triggered {
            *triggered = true;
            newly_triggered.push(*key);
        } else if !condition && *triggered && reset_enabled {
            *triggered = false;
        }
    }

    newly_triggered
}

/// Compute the latest closed-candle RSI from a full candle series.
///
/// The trailing candle is dropped when its bucket has not finished forming
/// at `now`; no value is ever derived from a mid-candle close.
pub fn closed_candle_rsi(
    candles: &[Candle],
    interval: CandleInterval,
    period: usize,
    now: DateTime<Utc>,
) -> Option<(f64, DateTime<Utc>)> {
    let closed: Vec<&Candle> = candles
        .iter()
        .filter(|c| c.open_time + interval.duration() <= now)
        .collect();

    let last = closed.last()?;
    let closes: Vec<f64> = closed.iter().map(|c| c.close).collect();
    wilder::latest_rsi(&closes, period).map(|rsi| (rsi, last.open_time))
}

/// RSI refresh task configuration
#[derive(Debug, Clone)]
pub struct RsiTaskConfig {
    /// Tracked token mint whose USD series feeds the RSI
    pub mint: String,
    /// Refresh cadence in minutes
    pub check_interval_mins: u64,
    /// Wilder period
    pub period: usize,
}

/// Run the RSI refresh scheduler until cancelled.
///
/// Upstream failure or insufficient history clears the published reading
/// (readers see "unavailable") while alert state stays untouched.
pub async fn run_rsi_engine(
    store: Arc<MonitorStore>,
    source: Arc<dyn CandleSource>,
    notifier: Arc<CompositeNotifier>,
    config: RsiTaskConfig,
    cancel_token: CancellationToken,
) {
    tracing::info!(
        check_interval_mins = config.check_interval_mins,
        period = config.period,
        mint = %config.mint,
        "Starting RSI engine task"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.check_interval_mins * 60));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                tracing::info!("RSI engine task shutting down");
                break;
            }
            _ = interval.tick() => {
                refresh_once(&store, source.as_ref(), &notifier, &config).await;
            }
        }
    }
}

/// One refresh cycle: fetch, compute, publish, notify
async fn refresh_once(
    store: &Arc<MonitorStore>,
    source: &dyn CandleSource,
    notifier: &Arc<CompositeNotifier>,
    config: &RsiTaskConfig,
) {
    let (epoch, interval) = store.rsi_target();

    let candles = match source.fetch_candles(&config.mint, interval).await {
        Ok(candles) => candles,
        Err(e) => {
            tracing::warn!(error = %e, interval = %interval, "Candle fetch failed, skipping RSI cycle");
            store.clear_rsi_reading(epoch);
            return;
        }
    };

    let now = Utc::now();
    let Some((rsi, candle_time)) = closed_candle_rsi(&candles, interval, config.period, now) else {
        tracing::warn!(
            interval = %interval,
            candle_count = candles.len(),
            "Not enough closed candles for RSI, reporting unavailable"
        );
        store.clear_rsi_reading(epoch);
        return;
    };

    let reading = RsiReading {
        value: rsi,
        candle_time,
        interval,
        computed_at: now,
    };

    match store.apply_rsi_reading(epoch, reading).await {
        Some(newly_triggered) => {
            tracing::debug!(rsi, interval = %interval, "Published RSI reading");
            for key in newly_triggered {
                let notifier = notifier.clone();
                // Delivery is best-effort and never blocks the refresh loop
                tokio::spawn(async move {
                    notifier
                        .notify(NotificationEvent::RsiThresholdHit { rsi, key })
                        .await;
                });
            }
        }
        None => {
            tracing::debug!(
                interval = %interval,
                "Interval changed during refresh, discarded stale RSI reading"
            );
        }
    }
}
