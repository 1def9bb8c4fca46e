//! Mock price source for testing without network calls.

use super::{PriceSource, PriceSourceError};
use crate::domain::Decimal;
use async_trait::async_trait;
use std::collections::HashMap;

/// Mock price source that returns predefined quotes.
#[derive(Debug, Clone, Default)]
pub struct MockPriceSource {
    prices: HashMap<String, Decimal>,
    fail: bool,
}

impl MockPriceSource {
    /// Create a new mock price source with no quotes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a quote for a symbol.
    pub fn with_price(mut self, symbol: &str, price: Decimal) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    /// Make every fetch fail with a network error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_price(&self, symbol: &str) -> Result<Option<Decimal>, PriceSourceError> {
        if self.fail {
            return Err(PriceSourceError::NetworkError(
                "mock failure".to_string(),
            ));
        }
        Ok(self.prices.get(symbol).copied())
    }
}
