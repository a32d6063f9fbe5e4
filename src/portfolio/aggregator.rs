//! Multi-wallet PnL aggregation with pacing and retry
//!
//! A refresh walks the wallet set sequentially under the throttle, retries
//! the failed subset once after a fixed backoff, and then derives the
//! aggregate. The snapshot is written wholesale, so readers between
//! refreshes always observe the last completed run. Overlapping refreshes
//! are rejected, never run in parallel.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::client::PortfolioService;
use super::throttle::Throttle;
use crate::error::{AppError, AppResult};
use crate::models::{AggregatePnl, PnlSnapshot, WalletPnlRecord};
use crate::store::MonitorStore;

/// Aggregator pacing configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Minimum spacing between per-wallet requests
    pub min_request_spacing: Duration,
    /// Backoff before the single retry pass over failed wallets
    pub retry_backoff: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_request_spacing: Duration::from_millis(1100),
            retry_backoff: Duration::from_millis(2000),
        }
    }
}

/// Wallet PnL aggregator
pub struct PnlAggregator {
    store: Arc<MonitorStore>,
    service: Arc<dyn PortfolioService>,
    throttle: Throttle,
    config: AggregatorConfig,
    /// Held for the duration of a refresh; `try_lock` failure means a
    /// refresh is already in flight and the new request is skipped
    refresh_guard: tokio::sync::Mutex<()>,
}

impl PnlAggregator {
    pub fn new(
        store: Arc<MonitorStore>,
        service: Arc<dyn PortfolioService>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            store,
            service,
            throttle: Throttle::new(config.min_request_spacing),
            config,
            refresh_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Refresh every wallet's PnL and persist the new snapshot.
    ///
    /// Returns `RefreshInProgress` when another refresh holds the guard.
    pub async fn refresh(&self) -> AppResult<PnlSnapshot> {
        let _guard = self
            .refresh_guard
            .try_lock()
            .map_err(|_| AppError::RefreshInProgress)?;

        let run_ts = Utc::now();
        let wallets = self.store.wallets();
        let mint = self.store.tracked_mint();

        tracing::info!(wallet_count = wallets.len(), "Starting PnL refresh");

        let mut records: BTreeMap<String, WalletPnlRecord> = BTreeMap::new();
        let mut failed: Vec<String> = Vec::new();

        // First pass: every wallet, paced
        for wallet in &wallets {
            if !self.fetch_into(wallet, &mint, run_ts, &mut records).await {
                failed.push(wallet.clone());
            }
        }

        // Single retry pass over the failed subset after a fixed backoff
        if !failed.is_empty() {
            tracing::warn!(
                failed_count = failed.len(),
                "Retrying failed wallets after backoff"
            );
            tokio::time::sleep(self.config.retry_backoff).await;

            let mut still_failed = Vec::new();
            for wallet in &failed {
                if !self.fetch_into(wallet, &mint, run_ts, &mut records).await {
                    still_failed.push(wallet.clone());
                }
            }
            failed = still_failed;
        }

        let aggregate = aggregate_records(&records, &failed, run_ts);

        let snapshot = PnlSnapshot {
            per_wallet: records,
            aggregate,
            refreshed_at: run_ts,
        };

        self.store.store_pnl_snapshot(snapshot.clone()).await?;

        tracing::info!(
            stale_count = snapshot.aggregate.stale_count,
            failed_count = snapshot.aggregate.failed_wallets.len(),
            "PnL refresh complete"
        );

        Ok(snapshot)
    }

    /// Fetch one wallet under the throttle. On failure the previous cached
    /// record (if any) is kept verbatim as a placeholder and `false` is
    /// returned.
    async fn fetch_into(
        &self,
        wallet: &str,
        mint: &str,
        run_ts: DateTime<Utc>,
        records: &mut BTreeMap<String, WalletPnlRecord>,
    ) -> bool {
        self.throttle.wait().await;

        match self.service.fetch_wallet_pnl(wallet, mint).await {
            Ok(fetch) => {
                records.insert(
                    wallet.to_string(),
                    WalletPnlRecord {
                        holding: fetch.holding,
                        realized: fetch.realized,
                        unrealized: fetch.unrealized,
                        current_value: fetch.current_value,
                        cost_basis: fetch.cost_basis,
                        last_trade_time: fetch.last_trade_time,
                        fetched_at: run_ts,
                    },
                );
                true
            }
            Err(e) => {
                tracing::warn!(wallet, error = %e, "Wallet PnL fetch failed");
                if let Some(cached) = self.store.cached_pnl_record(wallet) {
                    records.insert(wallet.to_string(), cached);
                }
                false
            }
        }
    }
}

/// Derive the aggregate from per-wallet records.
///
/// Sums are plain; cost basis is weighted by holding and defined as 0 when
/// the total holding is 0. A record is stale when its fetch timestamp does
/// not match this run, or when every numeric field is zero with no trade
/// history. The latter can misclassify a genuinely empty wallet; known
/// heuristic, kept as observed.
pub fn aggregate_records(
    records: &BTreeMap<String, WalletPnlRecord>,
    failed: &[String],
    run_ts: DateTime<Utc>,
) -> AggregatePnl {
    let mut aggregate = AggregatePnl::default();
    let mut weighted_basis = Decimal::ZERO;
    let mut total_holding = Decimal::ZERO;
    let mut latest_trade: Option<DateTime<Utc>> = None;
    let mut stale_wallets = Vec::new();

    for (wallet, record) in records {
        aggregate.holding += record.holding;
        aggregate.realized += record.realized;
        aggregate.unrealized += record.unrealized;
        aggregate.current_value += record.current_value;

        let holding = Decimal::from_f64_retain(record.holding).unwrap_or(Decimal::ZERO);
        let basis = Decimal::from_f64_retain(record.cost_basis).unwrap_or(Decimal::ZERO);
        weighted_basis += basis * holding;
        total_holding += holding;

        if let Some(raw) = &record.last_trade_time {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                let parsed = parsed.with_timezone(&Utc);
                if latest_trade.map_or(true, |t| parsed > t) {
                    latest_trade = Some(parsed);
                }
            }
        }

        if record.fetched_at != run_ts || record.is_empty_shape() {
            stale_wallets.push(wallet.clone());
        }
    }

    // Wallets that failed with no cached record carry no numbers but are
    // still reported as stale
    for wallet in failed {
        if !records.contains_key(wallet) && !stale_wallets.contains(wallet) {
            stale_wallets.push(wallet.clone());
        }
    }

    aggregate.cost_basis = if total_holding.is_zero() {
        0.0
    } else {
        (weighted_basis / total_holding).to_f64().unwrap_or(0.0)
    };
    aggregate.last_trade_time = latest_trade;
    aggregate.stale_count = stale_wallets.len();
    aggregate.stale_wallets = stale_wallets;
    aggregate.failed_wallets = failed.to_vec();

    aggregate
}

/// Run scheduled PnL refreshes until cancelled
pub async fn run_pnl_scheduler(
    aggregator: Arc<PnlAggregator>,
    refresh_interval_mins: u64,
    cancel_token: CancellationToken,
) {
    tracing::info!(
        refresh_interval_mins,
        "Starting PnL refresh scheduler"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(refresh_interval_mins * 60));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                tracing::info!("PnL scheduler shutting down");
                break;
            }
            _ = interval.tick() => {
                match aggregator.refresh().await {
                    Ok(_) => {}
                    Err(AppError::RefreshInProgress) => {
                        tracing::debug!("PnL refresh already running, skipping scheduled run");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Scheduled PnL refresh failed");
                    }
                }
            }
        }
    }
}
