//! Market Data Port (Driven Port)
//!
//! On-demand price lookup for one symbol.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::shared::Symbol;

/// Market data port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MarketDataError {
    /// Connection error.
    #[error("Market data connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Provider returned something unparseable.
    #[error("Malformed market data response: {message}")]
    MalformedResponse {
        /// Error details.
        message: String,
    },
}

/// Port for on-demand price lookups.
///
/// `Ok(None)` means no price is currently obtainable for the symbol; the
/// caller skips that symbol, it is never fatal to a pass.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Current price for a symbol, if one is obtainable.
    async fn get_price(&self, symbol: &Symbol) -> Result<Option<Decimal>, MarketDataError>;
}
