//! Binance spot ticker as the reference price source.
//!
//! `GET /api/v3/ticker/price?symbol=BTCUSDT` returns
//! `{"symbol":"BTCUSDT","price":"43512.10000000"}`. Failures are retried
//! with exponential backoff before surfacing.

use std::time::Duration;

use ladder_core::{retry, Price, RetryPolicy};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::feed::{BoxFuture, ReferencePriceFeed};

/// Public Binance REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Default timeout for a single request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TickerPriceResponse {
    symbol: String,
    price: String,
}

/// Parse a ticker response body into a positive price.
pub fn parse_ticker_price(body: &str) -> FeedResult<Price> {
    let ticker: TickerPriceResponse =
        serde_json::from_str(body).map_err(|e| FeedError::Parse(e.to_string()))?;
    Price::parse_positive(&ticker.price)
        .map_err(|e| FeedError::Parse(format!("{}: {e}", ticker.symbol)))
}

/// Reference price feed backed by the Binance ticker endpoint.
pub struct BinancePriceFeed {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl BinancePriceFeed {
    /// Create a new feed.
    ///
    /// # Arguments
    /// * `base_url` - REST root, e.g. `"https://api.binance.com"`
    /// * `policy` - Attempt cap and backoff applied to every lookup
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FeedError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        })
    }

    async fn fetch_once(&self, symbol: &str) -> FeedResult<Price> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| FeedError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FeedError::HttpClient(format!("Failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let price = parse_ticker_price(&body)?;
        debug!(symbol, price = %price, "Reference price fetched");
        Ok(price)
    }
}

impl ReferencePriceFeed for BinancePriceFeed {
    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, FeedResult<Price>> {
        Box::pin(async move {
            retry(
                &self.policy,
                "reference_price",
                |_| self.fetch_once(symbol),
                FeedError::is_retryable,
            )
            .await
            .map_err(|e| FeedError::Exhausted {
                symbol: symbol.to_string(),
                attempts: self.policy.max_attempts,
                last: e.to_string(),
            })
        })
    }
}
