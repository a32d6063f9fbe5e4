//! Monitor store tests
//!
//! Covers state mutators, threshold evaluation through the store, the RSI
//! epoch guard, and durable persistence across a reload.

use chrono::Utc;
use quotewatch::config::{
    AlertsConfig, AppConfig, DatabaseConfig, DisplayConfig, PortfolioConfig, QuoteConfig,
    RsiSectionConfig,
};
use quotewatch::db::{init_pool, run_migrations, DbPool};
use quotewatch::models::{
    CandleInterval, PriceSample, RsiAlertKey, RsiReading, Side, ThresholdKey,
};
use quotewatch::store::{MonitorStore, PRICE_HISTORY_CAP};
use rust_decimal::Decimal;
use std::str::FromStr;
use tempfile::TempDir;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn test_config(db_path: std::path::PathBuf) -> AppConfig {
    AppConfig {
        quote: QuoteConfig {
            input_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            output_mint: "So11111111111111111111111111111111111111112".to_string(),
            usd_amount: 100.0,
            check_interval_secs: 60,
            api_url: "https://quote-api.jup.ag/v6".to_string(),
            timeout_ms: 10_000,
        },
        alerts: AlertsConfig {
            buy: vec!["0.00135".to_string()],
            sell: vec!["0.002".to_string()],
            reset_minutes: 0,
            ntfy_topic: String::new(),
            ntfy_server: "https://ntfy.sh".to_string(),
        },
        rsi: RsiSectionConfig {
            alerts: vec!["above:70".to_string(), "below:30".to_string()],
            ..RsiSectionConfig::default()
        },
        portfolio: PortfolioConfig::default(),
        database: DatabaseConfig {
            path: db_path,
            max_connections: 5,
        },
        display: DisplayConfig::default(),
    }
}

async fn create_test_store() -> (MonitorStore, DbPool, AppConfig, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path().join("test.db"));
    let pool = init_pool(&config.database).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let store = MonitorStore::load(pool.clone(), &config).await.unwrap();
    (store, pool, config, temp_dir)
}

fn sample(buy: f64, sell: f64) -> PriceSample {
    PriceSample {
        timestamp: Utc::now(),
        buy_price: buy,
        sell_price: sell,
    }
}

#[tokio::test]
async fn config_thresholds_and_rsi_alerts_are_seeded() {
    let (store, _pool, _config, _tmp) = create_test_store().await;
    let snapshot = store.snapshot();

    assert_eq!(snapshot.thresholds.len(), 2);
    assert_eq!(snapshot.rsi_alerts.len(), 2);
    assert!(snapshot.rsi_alerts.iter().all(|(_, triggered)| !triggered));
    assert_eq!(snapshot.usd_amount, 100.0);
}

#[tokio::test]
async fn buy_threshold_fires_once_without_cooldown() {
    let (store, _pool, _config, _tmp) = create_test_store().await;

    // 0.0014 is above the 0.00135 buy target: no trigger
    let fired = store.ingest_sample(sample(0.0014, 0.0015), Utc::now()).await;
    assert!(fired.is_empty());

    // Crossing down fires the buy threshold
    let fired = store.ingest_sample(sample(0.00134, 0.0015), Utc::now()).await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].key, ThresholdKey::new(Side::Buy, dec("0.00135")));

    // reset_minutes = 0: the threshold stays latched
    let fired = store.ingest_sample(sample(0.00130, 0.0015), Utc::now()).await;
    assert!(fired.is_empty());
}

#[tokio::test]
async fn reset_rearms_threshold_immediately() {
    let (store, _pool, _config, _tmp) = create_test_store().await;
    let key = ThresholdKey::new(Side::Buy, dec("0.00135"));

    let fired = store.ingest_sample(sample(0.00134, 0.0015), Utc::now()).await;
    assert_eq!(fired.len(), 1);

    assert!(store.reset_threshold(key).await.unwrap());

    let fired = store.ingest_sample(sample(0.00134, 0.0015), Utc::now()).await;
    assert_eq!(fired.len(), 1);
}

#[tokio::test]
async fn remove_threshold_is_noop_when_absent() {
    let (store, _pool, _config, _tmp) = create_test_store().await;
    let missing = ThresholdKey::new(Side::Sell, dec("9.0"));
    assert!(!store.remove_threshold(missing).await.unwrap());

    let present = ThresholdKey::new(Side::Buy, dec("0.00135"));
    assert!(store.remove_threshold(present).await.unwrap());
    assert_eq!(store.snapshot().thresholds.len(), 1);
}

#[tokio::test]
async fn usd_amount_change_clears_history_and_rejects_non_positive() {
    let (store, _pool, _config, _tmp) = create_test_store().await;

    store.ingest_sample(sample(0.002, 0.0021), Utc::now()).await;
    assert_eq!(store.snapshot().price_history.len(), 1);

    store.set_usd_amount(250.0).await.unwrap();
    assert_eq!(store.usd_amount(), 250.0);
    assert!(store.snapshot().price_history.is_empty());

    assert!(store.set_usd_amount(0.0).await.is_err());
    assert!(store.set_usd_amount(-5.0).await.is_err());
    assert!(store.set_usd_amount(f64::NAN).await.is_err());
}

#[tokio::test]
async fn price_history_is_capped_fifo() {
    let (store, _pool, _config, _tmp) = create_test_store().await;

    for i in 0..(PRICE_HISTORY_CAP + 10) {
        let p = 0.01 + i as f64 * 1e-6;
        store.ingest_sample(sample(p, p), Utc::now()).await;
    }

    let history = store.snapshot().price_history;
    assert_eq!(history.len(), PRICE_HISTORY_CAP);
    // Oldest 10 were evicted
    assert!((history[0].buy_price - (0.01 + 10.0 * 1e-6)).abs() < 1e-12);
}

#[tokio::test]
async fn wallet_validation_and_dedupe() {
    let (store, _pool, _config, _tmp) = create_test_store().await;
    let addr = "So11111111111111111111111111111111111111112";

    assert!(store.add_wallet(addr).await.unwrap());
    assert!(!store.add_wallet(addr).await.unwrap());
    assert!(store.add_wallet("nope").await.is_err());
    assert_eq!(store.wallets(), vec![addr.to_string()]);
}

#[tokio::test]
async fn stale_epoch_reading_is_discarded() {
    let (store, _pool, _config, _tmp) = create_test_store().await;
    let (epoch, interval) = store.rsi_target();
    assert_eq!(interval, CandleInterval::OneSecond);

    // Interval switch bumps the epoch while a reading is in flight
    store.set_rsi_interval(CandleInterval::FiveMinutes).await.unwrap();

    let reading = RsiReading {
        value: 80.0,
        candle_time: Utc::now(),
        interval,
        computed_at: Utc::now(),
    };
    let outcome = store.apply_rsi_reading(epoch, reading).await;
    assert!(outcome.is_none());
    assert!(store.rsi_reading().is_none());
}

#[tokio::test]
async fn same_interval_switch_does_not_bump_epoch() {
    let (store, _pool, _config, _tmp) = create_test_store().await;
    let (epoch, interval) = store.rsi_target();

    store.set_rsi_interval(interval).await.unwrap();
    assert_eq!(store.rsi_target().0, epoch);

    store.set_rsi_interval(CandleInterval::OneHour).await.unwrap();
    assert_eq!(store.rsi_target().0, epoch + 1);
}

#[tokio::test]
async fn rsi_reading_publishes_and_triggers_alerts() {
    let (store, _pool, _config, _tmp) = create_test_store().await;
    let (epoch, interval) = store.rsi_target();

    let reading = RsiReading {
        value: 75.0,
        candle_time: Utc::now(),
        interval,
        computed_at: Utc::now(),
    };
    let newly = store.apply_rsi_reading(epoch, reading).await.unwrap();
    assert_eq!(newly, vec![RsiAlertKey::from_str("above:70").unwrap()]);
    assert_eq!(store.rsi_reading().unwrap().value, 75.0);

    // Failed refresh clears the reading but not the triggered flag
    store.clear_rsi_reading(epoch);
    assert!(store.rsi_reading().is_none());
    let snapshot = store.snapshot();
    let (_, triggered) = snapshot
        .rsi_alerts
        .iter()
        .find(|(k, _)| *k == RsiAlertKey::from_str("above:70").unwrap())
        .unwrap();
    assert!(*triggered);
}

#[tokio::test]
async fn state_survives_reload() {
    let (store, pool, config, _tmp) = create_test_store().await;

    store.ingest_sample(sample(0.00134, 0.0021), Utc::now()).await;
    store.set_usd_amount(250.0).await.unwrap();
    store.ingest_sample(sample(0.0019, 0.0021), Utc::now()).await;
    store.set_reset_minutes(30).await.unwrap();
    store
        .add_thresholds(Side::Sell, &[dec("0.0030")])
        .await
        .unwrap();
    store
        .add_wallet("So11111111111111111111111111111111111111112")
        .await
        .unwrap();
    store.set_rsi_interval(CandleInterval::OneHour).await.unwrap();
    store.set_rsi_reset_enabled(true).await.unwrap();

    let reloaded = MonitorStore::load(pool, &config).await.unwrap();
    let snapshot = reloaded.snapshot();

    assert_eq!(snapshot.usd_amount, 250.0);
    assert_eq!(snapshot.reset_minutes, 30);
    assert_eq!(snapshot.price_history.len(), 1);
    assert_eq!(snapshot.thresholds.len(), 3);
    assert_eq!(
        snapshot.wallets,
        vec!["So11111111111111111111111111111111111111112".to_string()]
    );
    assert_eq!(snapshot.rsi_config.interval, CandleInterval::OneHour);
    assert!(snapshot.rsi_config.reset_enabled);
    assert_eq!(snapshot.rsi_alerts.len(), 2);
}

#[tokio::test]
async fn triggered_state_survives_reload() {
    let (store, pool, config, _tmp) = create_test_store().await;

    let fired = store.ingest_sample(sample(0.00134, 0.0015), Utc::now()).await;
    assert_eq!(fired.len(), 1);

    let reloaded = MonitorStore::load(pool, &config).await.unwrap();

    // Still latched after restart: the same sample fires nothing
    let fired = reloaded
        .ingest_sample(sample(0.00134, 0.0015), Utc::now())
        .await;
    assert!(fired.is_empty());
}

#[tokio::test]
async fn persist_failure_still_reports_fired_thresholds() {
    let (store, pool, _config, _tmp) = create_test_store().await;

    // Database gone: persistence fails, but the trigger latched in memory
    // and its fired entry must still reach the caller for notification
    pool.close().await;

    let fired = store.ingest_sample(sample(0.00134, 0.0015), Utc::now()).await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].key, ThresholdKey::new(Side::Buy, dec("0.00135")));
    assert!(store.snapshot().thresholds[0].last_triggered.is_some());

    // Latched as usual: the same sample fires nothing afterwards
    let fired = store.ingest_sample(sample(0.00134, 0.0015), Utc::now()).await;
    assert!(fired.is_empty());
}

#[tokio::test]
async fn persist_failure_still_reports_rsi_transitions() {
    let (store, pool, _config, _tmp) = create_test_store().await;
    let (epoch, interval) = store.rsi_target();

    pool.close().await;

    let reading = RsiReading {
        value: 75.0,
        candle_time: Utc::now(),
        interval,
        computed_at: Utc::now(),
    };
    let newly = store.apply_rsi_reading(epoch, reading).await.unwrap();
    assert_eq!(newly, vec![RsiAlertKey::from_str("above:70").unwrap()]);
    assert_eq!(store.rsi_reading().unwrap().value, 75.0);
}

#[tokio::test]
async fn subsystem_enabled_flags_reflect_configured_credentials() {
    // No API keys configured: both subsystems report disabled
    let (store, _pool, _config, _tmp) = create_test_store().await;
    let snapshot = store.snapshot();
    assert!(!snapshot.rsi_enabled);
    assert!(!snapshot.pnl_enabled);

    // With credentials, readers can tell "no reading yet" apart from
    // "subsystem never runs"
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(temp_dir.path().join("test.db"));
    config.rsi.api_key = Some("chart-key".to_string());
    config.portfolio.api_key = Some("analytics-key".to_string());
    let pool = init_pool(&config.database).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let store = MonitorStore::load(pool, &config).await.unwrap();

    let snapshot = store.snapshot();
    assert!(snapshot.rsi_enabled);
    assert!(snapshot.pnl_enabled);
    assert!(snapshot.rsi_reading.is_none());

    // An empty key is no credential
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(temp_dir.path().join("test.db"));
    config.rsi.api_key = Some(String::new());
    let pool = init_pool(&config.database).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let store = MonitorStore::load(pool, &config).await.unwrap();
    assert!(!store.snapshot().rsi_enabled);
}
