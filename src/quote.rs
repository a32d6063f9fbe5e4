//! Price-quoting collaborator
//!
//! Wraps the swap quote API behind a small trait so the sampler can be
//! tested with a fake. Quotes are simulated swaps with live price impact,
//! not static spot prices: the out-amount reflects what the notional would
//! actually receive.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Decimals used by the USD-pegged input mint (USDC-style, 6 dp)
pub const USD_DECIMALS: u32 = 6;

/// Convert a USD amount to base units of the USD-pegged mint
pub fn usd_to_lamports(usd: f64) -> u64 {
    (usd * 10f64.powi(USD_DECIMALS as i32)) as u64
}

/// Convert base units of the USD-pegged mint back to a USD amount
pub fn lamports_to_units(lamports: u64) -> f64 {
    lamports as f64 / 10f64.powi(USD_DECIMALS as i32)
}

/// Swap-quote seam, injectable for tests
#[async_trait]
pub trait QuoteService: Send + Sync {
    /// Quote swapping `amount` base units of `input_mint` into `output_mint`,
    /// returning the out-amount in base units (impact-inclusive)
    async fn out_amount(&self, input_mint: &str, output_mint: &str, amount: u64)
        -> AppResult<u64>;
}

/// Jupiter-style quote API client
pub struct JupiterQuoteClient {
    client: reqwest::Client,
    base_url: String,
}

impl JupiterQuoteClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Quote API response; only the out-amount is consumed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    out_amount: String,
}

#[async_trait]
impl QuoteService for JupiterQuoteClient {
    async fn out_amount(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
    ) -> AppResult<u64> {
        let url = format!("{}/quote", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("inputMint", input_mint),
                ("outputMint", output_mint),
                ("amount", &amount.to_string()),
                ("slippage", "1"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Quote request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Quote API returned {}",
                response.status()
            )));
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse quote response: {}", e)))?;

        quote
            .out_amount
            .parse::<u64>()
            .map_err(|e| AppError::Upstream(format!("Malformed outAmount in quote: {}", e)))
    }
}
