//! Quotewatch - token price monitor
//!
//! This is the main entry point for the monitor service. It wires the
//! store, quote sampler, RSI engine, and PnL aggregator together and
//! runs them as cancellable background tasks until shutdown.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quotewatch::config::AppConfig;
use quotewatch::db;
use quotewatch::notifications::{CompositeNotifier, NtfyConfig, NtfyNotifier};
use quotewatch::portfolio::{run_pnl_scheduler, AggregatorConfig, PnlAggregator, TrackerPnlClient};
use quotewatch::quote::JupiterQuoteClient;
use quotewatch::rsi::{run_rsi_engine, RsiTaskConfig, TrackerCandleClient, DEFAULT_PERIOD};
use quotewatch::sampler::{run_price_sampler, SamplerConfig};
use quotewatch::store::MonitorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    tracing::info!("Starting Quotewatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config()?;
    tracing::info!(
        mint = %config.quote.output_mint,
        check_interval_secs = config.quote.check_interval_secs,
        "Configuration loaded"
    );

    // Initialize database
    let db_pool = db::init_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;
    tracing::info!("Database initialized");

    // Load persisted monitor state over config defaults
    let store = Arc::new(MonitorStore::load(db_pool.clone(), &config).await?);
    tracing::info!("Monitor state loaded");

    // Build the notifier fan-out
    let mut notifier = CompositeNotifier::new();
    if config.alerts.ntfy_topic.is_empty() {
        tracing::info!("No ntfy topic configured, notifications disabled");
    } else {
        let ntfy = NtfyNotifier::new(NtfyConfig {
            server: config.alerts.ntfy_server.clone(),
            topic: config.alerts.ntfy_topic.clone(),
            timeout_ms: config.quote.timeout_ms,
        })?;
        notifier.add_service(Arc::new(ntfy));
        tracing::info!(server = %config.alerts.ntfy_server, "ntfy notifications enabled");
    }
    let notifier = Arc::new(notifier);

    let cancel_token = CancellationToken::new();
    let mut tasks = Vec::new();

    // Spawn price sampler
    {
        let quote_client =
            Arc::new(JupiterQuoteClient::new(&config.quote.api_url, config.quote.timeout_ms)?);
        let sampler_config = SamplerConfig {
            input_mint: config.quote.input_mint.clone(),
            output_mint: config.quote.output_mint.clone(),
            check_interval_secs: config.quote.check_interval_secs,
        };
        tasks.push(tokio::spawn(run_price_sampler(
            store.clone(),
            quote_client,
            notifier.clone(),
            sampler_config,
            cancel_token.clone(),
        )));
        tracing::info!("Price sampler started");
    }

    // Spawn RSI engine when a chart API key is present
    match &config.rsi.api_key {
        Some(api_key) if !api_key.is_empty() => {
            let candle_client = Arc::new(TrackerCandleClient::new(
                &config.rsi.api_url,
                api_key,
                config.rsi.timeout_ms,
            )?);
            let rsi_config = RsiTaskConfig {
                mint: config.quote.output_mint.clone(),
                check_interval_mins: config.rsi.check_interval_mins,
                period: DEFAULT_PERIOD,
            };
            tasks.push(tokio::spawn(run_rsi_engine(
                store.clone(),
                candle_client,
                notifier.clone(),
                rsi_config,
                cancel_token.clone(),
            )));
            tracing::info!("RSI engine started");
        }
        _ => {
            tracing::info!("No chart API key configured, RSI engine disabled");
        }
    }

    // Spawn PnL refresh scheduler when an analytics API key is present
    match &config.portfolio.api_key {
        Some(api_key) if !api_key.is_empty() => {
            let pnl_client = Arc::new(TrackerPnlClient::new(
                &config.portfolio.api_url,
                api_key,
                config.portfolio.timeout_ms,
            )?);
            let aggregator = Arc::new(PnlAggregator::new(
                store.clone(),
                pnl_client,
                AggregatorConfig {
                    min_request_spacing: std::time::Duration::from_millis(
                        config.portfolio.min_request_spacing_ms,
                    ),
                    retry_backoff: std::time::Duration::from_millis(
                        config.portfolio.retry_backoff_ms,
                    ),
                },
            ));

            if config.portfolio.refresh_interval_mins == 0 {
                tracing::info!("PnL scheduler disabled, refreshes are on demand only");
            } else {
                tasks.push(tokio::spawn(run_pnl_scheduler(
                    aggregator,
                    config.portfolio.refresh_interval_mins,
                    cancel_token.clone(),
                )));
                tracing::info!("PnL refresh scheduler started");
            }
        }
        _ => {
            tracing::info!("No analytics API key configured, PnL aggregation disabled");
        }
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping tasks");
    cancel_token.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Background task panicked during shutdown");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quotewatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load and validate configuration
fn load_config() -> anyhow::Result<AppConfig> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    Ok(config)
}
