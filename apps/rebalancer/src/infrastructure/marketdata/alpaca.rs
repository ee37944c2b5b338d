//! Alpaca market data adapter implementing `MarketDataPort`.
//!
//! Uses the latest-trade endpoint for on-demand price lookups. A symbol with
//! no obtainable price resolves to `Ok(None)` so the caller can skip it.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::ports::{MarketDataError, MarketDataPort};
use crate::domain::shared::Symbol;

use crate::infrastructure::broker::alpaca::api_types::AlpacaLatestTradeResponse;
use crate::infrastructure::broker::alpaca::http_client::AlpacaHttpClient;
use crate::infrastructure::broker::alpaca::{AlpacaConfig, AlpacaError};

/// Alpaca latest-trade price lookup.
#[derive(Debug, Clone)]
pub struct AlpacaMarketDataAdapter {
    client: AlpacaHttpClient,
}

impl AlpacaMarketDataAdapter {
    /// Create a new market data adapter.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        Ok(Self {
            client: AlpacaHttpClient::new(config)?,
        })
    }
}

#[async_trait]
impl MarketDataPort for AlpacaMarketDataAdapter {
    async fn get_price(&self, symbol: &Symbol) -> Result<Option<Decimal>, MarketDataError> {
        let result: Result<AlpacaLatestTradeResponse, AlpacaError> = self
            .client
            .data_get(&format!("/v2/stocks/{}/trades/latest", symbol.as_str()))
            .await;

        match result {
            Ok(response) => {
                let price = response.trade.map(|t| t.price);
                if price.is_none() {
                    tracing::debug!(symbol = %symbol, "No latest trade for symbol");
                }
                Ok(price.filter(|p| *p > Decimal::ZERO))
            }
            // Unknown or untraded symbol.
            Err(AlpacaError::NotFound { .. }) => Ok(None),
            Err(e) => Err(MarketDataError::from(e)),
        }
    }
}
