//! Price source abstraction for live dashboard quotes.

use crate::domain::Decimal;
use async_trait::async_trait;
use std::fmt;

pub mod mock;
pub mod quote;

pub use mock::MockPriceSource;
pub use quote::HttpPriceSource;

/// Price source trait for fetching the latest trade price of a symbol.
///
/// Implementations must handle retry/backoff and rate limiting. The
/// dashboard treats an unavailable price as degraded, never as an error:
/// `Ok(None)` means the source has no quote for the symbol.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Fetch the latest price for a symbol, or None if the source has no
    /// quote for it.
    async fn fetch_price(&self, symbol: &str) -> Result<Option<Decimal>, PriceSourceError>;
}

/// Error type for price source operations.
#[derive(Debug, Clone)]
pub enum PriceSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
}

impl fmt::Display for PriceSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            PriceSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            PriceSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            PriceSourceError::RateLimited => write!(f, "Rate limited"),
        }
    }
}

impl std::error::Error for PriceSourceError {}
