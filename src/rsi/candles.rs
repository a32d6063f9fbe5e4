//! Candle source for the RSI series
//!
//! Fetches fixed-width OHLCV buckets for the tracked token's USD price from
//! the chart API. Only `time` and `close` are consumed; the series is always
//! the token's continuous USD price, never its native-asset pair.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::CandleInterval;

/// One closed candle
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close: f64,
}

/// Source of candle history, injectable for tests
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch the candle series for `mint` at `interval`, sorted ascending
    /// by open time
    async fn fetch_candles(&self, mint: &str, interval: CandleInterval) -> AppResult<Vec<Candle>>;
}

/// Chart API client (solanatracker-style `/chart/{token}` endpoint)
pub struct TrackerCandleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TrackerCandleClient {
    pub fn new(base_url: &str, api_key: &str, timeout_ms: u64) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

/// Chart API response structure
#[derive(Debug, Deserialize)]
struct ChartResponse {
    oclhv: Vec<RawCandle>,
}

#[derive(Debug, Deserialize)]
struct RawCandle {
    /// Unix seconds
    time: i64,
    close: f64,
}

#[async_trait]
impl CandleSource for TrackerCandleClient {
    async fn fetch_candles(&self, mint: &str, interval: CandleInterval) -> AppResult<Vec<Candle>> {
        let url = format!("{}/chart/{}", self.base_url, mint);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&[("type", interval.as_str()), ("removeOutliers", "true")])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Chart request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Chart API returned {}",
                response.status()
            )));
        }

        let data: ChartResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse chart response: {}", e)))?;

        let mut candles: Vec<Candle> = data
            .oclhv
            .into_iter()
            .filter_map(|raw| {
                Utc.timestamp_opt(raw.time, 0).single().map(|open_time| Candle {
                    open_time,
                    close: raw.close,
                })
            })
            .collect();
        candles.sort_by_key(|c| c.open_time);

        Ok(candles)
    }
}
