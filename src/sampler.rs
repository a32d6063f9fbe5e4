//! Periodic price sampling task
//!
//! Each tick performs two simulated swaps against the quote service: a
//! forward swap (USD notional into the tracked token) and a reverse swap
//! (that token amount back into USD), both impact-inclusive. The resulting
//! sample is appended to history and evaluated against every threshold in
//! one serialized step; fired thresholds produce fire-and-forget
//! notifications. A failed quote skips the tick and leaves state untouched.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::models::{PriceSample, Side};
use crate::notifications::{CompositeNotifier, NotificationEvent};
use crate::quote::{self, QuoteService};
use crate::store::MonitorStore;

/// Price sampler configuration
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// USD-pegged input mint
    pub input_mint: String,
    /// Tracked token mint
    pub output_mint: String,
    /// Poll period in seconds
    pub check_interval_secs: u64,
}

/// Run the price sampler until cancelled
pub async fn run_price_sampler(
    store: Arc<MonitorStore>,
    quote: Arc<dyn QuoteService>,
    notifier: Arc<CompositeNotifier>,
    config: SamplerConfig,
    cancel_token: CancellationToken,
) {
    tracing::info!(
        check_interval_secs = config.check_interval_secs,
        input_mint = %config.input_mint,
        output_mint = %config.output_mint,
        "Starting price sampler task"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.check_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                tracing::info!("Price sampler task shutting down");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = sample_once(&store, quote.as_ref(), &notifier, &config).await {
                    tracing::warn!(error = %e, "Price check failed, skipping tick");
                }
            }
        }
    }
}

/// One poll cycle: quote both directions, record, evaluate, notify
pub async fn sample_once(
    store: &Arc<MonitorStore>,
    quote: &dyn QuoteService,
    notifier: &Arc<CompositeNotifier>,
    config: &SamplerConfig,
) -> AppResult<()> {
    let usd_amount = store.usd_amount();
    let usd_lamports = quote::usd_to_lamports(usd_amount);

    // Forward: USD notional -> token
    let token_out = quote
        .out_amount(&config.input_mint, &config.output_mint, usd_lamports)
        .await?;
    if token_out == 0 {
        return Err(AppError::Upstream("Quote returned zero out-amount".to_string()));
    }
    let token_received = quote::lamports_to_units(token_out);

    // Reverse: same token amount -> USD
    let usd_back = quote
        .out_amount(&config.output_mint, &config.input_mint, token_out)
        .await?;
    let usd_returned = quote::lamports_to_units(usd_back);

    let sample = PriceSample {
        timestamp: Utc::now(),
        buy_price: usd_amount / token_received,
        sell_price: usd_returned / token_received,
    };

    tracing::debug!(
        buy_price = sample.buy_price,
        sell_price = sample.sell_price,
        "Sampled prices"
    );

    let fired = store.ingest_sample(sample, Utc::now()).await;

    for triggered in fired {
        tracing::info!(
            threshold = %triggered.key,
            price = triggered.price,
            "Price threshold fired"
        );

        let event = match triggered.key.side {
            Side::Buy => NotificationEvent::BuyThresholdHit {
                price: triggered.price,
                target: triggered.key.value,
            },
            Side::Sell => NotificationEvent::SellThresholdHit {
                price: triggered.price,
                target: triggered.key.value,
            },
        };

        // Delivery failure never reverts the trigger state set above
        let notifier = notifier.clone();
        tokio::spawn(async move {
            notifier.notify(event).await;
        });
    }

    Ok(())
}
