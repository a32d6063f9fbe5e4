//! Portfolio analytics collaborator
//!
//! Fetches per-wallet PnL for the tracked token from the analytics API.
//! Hidden behind a trait so the aggregator can be driven by fakes in tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// One wallet's PnL as fetched from the analytics service, before the
/// aggregator stamps it with the run timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletPnlFetch {
    pub holding: f64,
    pub realized: f64,
    pub unrealized: f64,
    pub current_value: f64,
    pub cost_basis: f64,
    pub last_trade_time: Option<String>,
}

/// Analytics seam, injectable for tests
#[async_trait]
pub trait PortfolioService: Send + Sync {
    /// Fetch `wallet`'s PnL for `mint`
    async fn fetch_wallet_pnl(&self, wallet: &str, mint: &str) -> AppResult<WalletPnlFetch>;
}

/// Analytics API client (solanatracker-style `/pnl/{wallet}` endpoint)
pub struct TrackerPnlClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TrackerPnlClient {
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

/// Analytics API response for a single wallet/token pair
#[derive(Debug, Deserialize)]
struct PnlResponse {
    #[serde(default)]
    holding: f64,
    #[serde(default)]
    realized: f64,
    #[serde(default)]
    unrealized: f64,
    #[serde(default, rename = "current_value")]
    current_value: f64,
    #[serde(default, rename = "cost_basis")]
    cost_basis: f64,
    #[serde(default, rename = "last_trade_time")]
    last_trade_time: Option<String>,
}

#[async_trait]
impl PortfolioService for TrackerPnlClient {
    async fn fetch_wallet_pnl(&self, wallet: &str, mint: &str) -> AppResult<WalletPnlFetch> {
        let url = format!("{}/pnl/{}", self.base_url, wallet);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&[("token", mint)])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("PnL request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "PnL API returned {}",
                response.status()
            )));
        }

        let pnl: PnlResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse PnL response: {}", e)))?;

        Ok(WalletPnlFetch {
            holding: pnl.holding,
            realized: pnl.realized,
            unrealized: pnl.unrealized,
            current_value: pnl.current_value,
            cost_basis: pnl.cost_basis,
            last_trade_time: pnl.last_trade_time,
        })
    }
}
