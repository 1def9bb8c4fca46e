//! HTTP quote client implementation.

use super::{PriceSource, PriceSourceError};
use crate::domain::Decimal;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Price source backed by a simple quote HTTP API.
///
/// Expects `GET {base_url}/quote?symbol=X` to return
/// `{"symbol": "...", "price": "12.34"}`, with 404 meaning the symbol is
/// unknown to the feed.
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    client: Client,
    base_url: String,
}

impl HttpPriceSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn get_quote(&self, symbol: &str) -> Result<Option<serde_json::Value>, PriceSourceError> {
        let url = format!("{}/quote", self.base_url);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(&[("symbol", symbol)])
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(PriceSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 404 {
                return Ok(None);
            }
            if status == 429 {
                return Err(backoff::Error::transient(PriceSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(PriceSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(PriceSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map(Some)
                .map_err(|e| {
                    backoff::Error::permanent(PriceSourceError::ParseError(e.to_string()))
                })
        })
        .await
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_price(&self, symbol: &str) -> Result<Option<Decimal>, PriceSourceError> {
        debug!("Fetching quote for symbol={}", symbol);

        let Some(response) = self.get_quote(symbol).await? else {
            return Ok(None);
        };

        let price_str = response
            .get("price")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PriceSourceError::ParseError("Missing price field".to_string()))?;

        Decimal::from_str_canonical(price_str)
            .map(Some)
            .map_err(|e| PriceSourceError::ParseError(format!("Invalid price: {}", e)))
    }
}
