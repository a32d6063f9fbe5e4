//! End-to-end alert flow tests
//!
//! Drives the full sampler path (quote -> derived prices -> store ->
//! trigger) with a scripted quote fake, and the RSI path from raw candles
//! through the store's publish/transition step.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use quotewatch::config::{
    AlertsConfig, AppConfig, DatabaseConfig, DisplayConfig, PortfolioConfig, QuoteConfig,
    RsiSectionConfig,
};
use quotewatch::db::{init_pool, run_migrations};
use quotewatch::error::{AppError, AppResult};
use quotewatch::models::{RsiAlertKey, RsiReading};
use quotewatch::notifications::CompositeNotifier;
use quotewatch::quote::QuoteService;
use quotewatch::rsi::{closed_candle_rsi, Candle, DEFAULT_PERIOD};
use quotewatch::sampler::{sample_once, SamplerConfig};
use quotewatch::store::MonitorStore;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const TOKEN: &str = "So11111111111111111111111111111111111111112";

/// Scripted quote service: pops pre-staged out-amounts in call order
struct ScriptedQuotes {
    responses: Mutex<Vec<AppResult<u64>>>,
}

impl ScriptedQuotes {
    fn new(responses: Vec<AppResult<u64>>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl QuoteService for ScriptedQuotes {
    async fn out_amount(
        &self,
        _input_mint: &str,
        _output_mint: &str,
        _amount: u64,
    ) -> AppResult<u64> {
        let mut responses = self.responses.lock();
        if responses.is_empty() {
            return Err(AppError::Upstream("no scripted quote".to_string()));
        }
        responses.remove(0)
    }
}

async fn create_store(buy: &[&str], sell: &[&str], rsi_alerts: &[&str]) -> (Arc<MonitorStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = AppConfig {
        quote: QuoteConfig {
            input_mint: USDC.to_string(),
            output_mint: TOKEN.to_string(),
            usd_amount: 100.0,
            check_interval_secs: 60,
            api_url: "https://quote-api.jup.ag/v6".to_string(),
            timeout_ms: 10_000,
        },
        alerts: AlertsConfig {
            buy: buy.iter().map(|s| s.to_string()).collect(),
            sell: sell.iter().map(|s| s.to_string()).collect(),
            reset_minutes: 0,
            ntfy_topic: String::new(),
            ntfy_server: "https://ntfy.sh".to_string(),
        },
        rsi: RsiSectionConfig {
            alerts: rsi_alerts.iter().map(|s| s.to_string()).collect(),
            ..RsiSectionConfig::default()
        },
        portfolio: PortfolioConfig::default(),
        database: DatabaseConfig {
            path: temp_dir.path().join("test.db"),
            max_connections: 5,
        },
        display: DisplayConfig::default(),
    };
    let pool = init_pool(&config.database).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let store = Arc::new(MonitorStore::load(pool, &config).await.unwrap());
    (store, temp_dir)
}

fn sampler_config() -> SamplerConfig {
    SamplerConfig {
        input_mint: USDC.to_string(),
        output_mint: TOKEN.to_string(),
        check_interval_secs: 60,
    }
}

#[tokio::test]
async fn sampled_prices_derive_from_both_quote_legs() {
    let (store, _tmp) = create_store(&[], &[], &[]).await;
    let notifier = Arc::new(CompositeNotifier::new());

    // $100 buys 50_000 token units; selling them returns $98
    let quotes = ScriptedQuotes::new(vec![Ok(50_000_000_000), Ok(98_000_000)]);
    sample_once(&store, &quotes, &notifier, &sampler_config())
        .await
        .unwrap();

    let history = store.snapshot().price_history;
    assert_eq!(history.len(), 1);
    assert!((history[0].buy_price - 0.002).abs() < 1e-12);
    assert!((history[0].sell_price - 0.00196).abs() < 1e-12);
}

#[tokio::test]
async fn quote_failure_records_nothing() {
    let (store, _tmp) = create_store(&["0.0021"], &[], &[]).await;
    let notifier = Arc::new(CompositeNotifier::new());

    // Forward leg succeeds, reverse leg fails: the whole cycle is skipped
    let quotes = ScriptedQuotes::new(vec![Ok(50_000_000_000), Err(AppError::RateLimited)]);
    let result = sample_once(&store, &quotes, &notifier, &sampler_config()).await;

    assert!(result.is_err());
    assert!(store.snapshot().price_history.is_empty());
}

#[tokio::test]
async fn buy_threshold_fires_through_full_sampler_path() {
    let (store, _tmp) = create_store(&["0.0021"], &[], &[]).await;
    let notifier = Arc::new(CompositeNotifier::new());

    // buy price 0.002 <= target 0.0021
    let quotes = ScriptedQuotes::new(vec![Ok(50_000_000_000), Ok(98_000_000)]);
    sample_once(&store, &quotes, &notifier, &sampler_config())
        .await
        .unwrap();

    let snapshot = store.snapshot();
    assert!(snapshot.thresholds[0].last_triggered.is_some());
}

#[tokio::test]
async fn rsi_from_candles_triggers_alert_flow() {
    let (store, _tmp) = create_store(&[], &[], &["above:70"]).await;
    let (epoch, interval) = store.rsi_target();

    // Strictly rising closes saturate the RSI at 100. The trailing candle
    // opened just now, is still forming, and must not feed the series even
    // though its close would crash the RSI.
    let now = Utc::now();
    let n = DEFAULT_PERIOD + 2;
    let mut candles: Vec<Candle> = (0..n)
        .map(|i| Candle {
            open_time: now - interval.duration() * ((n - i) as i32),
            close: 1.0 + i as f64 * 0.01,
        })
        .collect();
    candles.push(Candle {
        open_time: now,
        close: 0.5,
    });

    let (value, candle_time) = closed_candle_rsi(&candles, interval, DEFAULT_PERIOD, now).unwrap();
    assert_eq!(value, 100.0);

    let reading = RsiReading {
        value,
        candle_time,
        interval,
        computed_at: now,
    };
    let newly = store.apply_rsi_reading(epoch, reading).await.unwrap();
    assert_eq!(newly, vec![RsiAlertKey::from_str("above:70").unwrap()]);

    // Same reading again does not re-trigger the latched alert
    let reading = RsiReading {
        value,
        candle_time,
        interval,
        computed_at: Utc::now(),
    };
    let newly = store.apply_rsi_reading(epoch, reading).await.unwrap();
    assert!(newly.is_empty());
}

#[tokio::test]
async fn short_candle_series_yields_no_reading() {
    let (store, _tmp) = create_store(&[], &[], &[]).await;
    let (_, interval) = store.rsi_target();

    let now = Utc::now();
    let candles: Vec<Candle> = (0..5)
        .map(|i| Candle {
            open_time: now - interval.duration() * (10 - i),
            close: 1.0,
        })
        .collect();

    assert!(closed_candle_rsi(&candles, interval, DEFAULT_PERIOD, now).is_none());
}
