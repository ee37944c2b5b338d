//! Alpaca broker adapter implementing `BrokerPort`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::application::ports::{AccountSummary, BrokerError, BrokerPort, OrderRef};
use crate::domain::account::Position;
use crate::domain::policy::{stop_price, target_price};
use crate::domain::shared::Symbol;

use super::api_types::{
    AlpacaAccountResponse, AlpacaOrderRequest, AlpacaOrderResponse, AlpacaPositionResponse,
    StopLossLeg, TakeProfitLeg,
};
use super::config::{AlpacaConfig, AlpacaEnvironment};
use super::error::AlpacaError;
use super::http_client::AlpacaHttpClient;

/// Alpaca Markets broker adapter.
///
/// Entries are GTC market bracket orders; exits close the whole position via
/// the positions endpoint.
#[derive(Debug, Clone)]
pub struct AlpacaBrokerAdapter {
    client: AlpacaHttpClient,
    environment: AlpacaEnvironment,
}

impl AlpacaBrokerAdapter {
    /// Create a new Alpaca broker adapter.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        let client = AlpacaHttpClient::new(config)?;
        Ok(Self {
            client,
            environment: config.environment,
        })
    }

    /// Check if we're in live trading mode.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.environment.is_live()
    }

    /// Build a bracket order request from entry parameters.
    ///
    /// Bracket leg prices are rounded to two decimal places; Alpaca rejects
    /// sub-penny prices on the protective legs.
    fn to_bracket_request(
        symbol: &Symbol,
        qty: i64,
        entry_price: Decimal,
        stop_loss_pct: Decimal,
        take_profit_pct: Decimal,
        client_order_id: String,
    ) -> AlpacaOrderRequest {
        let stop = stop_price(entry_price, stop_loss_pct).round_dp(2);
        let target = target_price(entry_price, take_profit_pct).round_dp(2);

        AlpacaOrderRequest {
            symbol: symbol.as_str().to_string(),
            qty: qty.to_string(),
            side: "buy".to_string(),
            order_type: "market".to_string(),
            time_in_force: "gtc".to_string(),
            order_class: Some("bracket".to_string()),
            take_profit: Some(TakeProfitLeg {
                limit_price: target.to_string(),
            }),
            stop_loss: Some(StopLossLeg {
                stop_price: stop.to_string(),
            }),
            client_order_id: Some(client_order_id),
        }
    }

    async fn get_account(&self) -> Result<AlpacaAccountResponse, BrokerError> {
        self.client
            .get("/v2/account")
            .await
            .map_err(BrokerError::from)
    }
}

#[async_trait]
impl BrokerPort for AlpacaBrokerAdapter {
    async fn authenticate(&self) -> Result<AccountSummary, BrokerError> {
        let account = self.get_account().await?;
        tracing::info!(
            account_id = %account.id,
            status = %account.status,
            environment = %self.environment,
            "Alpaca account verified"
        );
        Ok(AccountSummary {
            equity: account.equity,
            cash: account.cash,
            status: account.status,
        })
    }

    async fn get_cash(&self) -> Result<Decimal, BrokerError> {
        Ok(self.get_account().await?.cash)
    }

    async fn get_positions(&self) -> Result<BTreeMap<Symbol, Position>, BrokerError> {
        let responses: Vec<AlpacaPositionResponse> = self
            .client
            .get("/v2/positions")
            .await
            .map_err(BrokerError::from)?;

        let mut positions = BTreeMap::new();
        for response in responses {
            let symbol = Symbol::new(&response.symbol);
            let qty = response.qty.trunc().to_i64().unwrap_or(0);
            positions.insert(
                symbol.clone(),
                Position::new(symbol, qty, response.avg_entry_price),
            );
        }
        Ok(positions)
    }

    async fn submit_buy(
        &self,
        symbol: &Symbol,
        qty: i64,
        entry_price: Decimal,
        stop_loss_pct: Decimal,
        take_profit_pct: Decimal,
    ) -> Result<OrderRef, BrokerError> {
        if self.is_live() {
            tracing::warn!(
                symbol = %symbol,
                qty,
                "Submitting LIVE order - this will execute real trades"
            );
        }

        let client_order_id = format!("rebal-{}", uuid::Uuid::new_v4());
        let request = Self::to_bracket_request(
            symbol,
            qty,
            entry_price,
            stop_loss_pct,
            take_profit_pct,
            client_order_id.clone(),
        );

        tracing::info!(
            symbol = %symbol,
            qty,
            entry_price = %entry_price,
            stop_price = ?request.stop_loss.as_ref().map(|l| &l.stop_price),
            limit_price = ?request.take_profit.as_ref().map(|l| &l.limit_price),
            client_order_id = %client_order_id,
            "Submitting bracket order to Alpaca"
        );

        let response: AlpacaOrderResponse = self
            .client
            .post("/v2/orders", &request)
            .await
            .map_err(BrokerError::from)?;

        tracing::info!(
            symbol = %symbol,
            broker_order_id = %response.id,
            status = %response.status,
            "Order submitted"
        );

        Ok(OrderRef::new(response.id).with_client_id(client_order_id))
    }

    async fn submit_sell_all(&self, symbol: &Symbol) -> Result<Option<OrderRef>, BrokerError> {
        let result: Result<AlpacaOrderResponse, AlpacaError> = self
            .client
            .delete(&format!("/v2/positions/{}", symbol.as_str()))
            .await;

        match result {
            Ok(response) => {
                tracing::info!(
                    symbol = %symbol,
                    broker_order_id = %response.id,
                    "Position liquidation submitted"
                );
                let order = match response.client_order_id {
                    Some(client_id) => OrderRef::new(response.id).with_client_id(client_id),
                    None => OrderRef::new(response.id),
                };
                Ok(Some(order))
            }
            // No position for the symbol: a no-op, not a failure.
            Err(AlpacaError::NotFound { .. }) => Ok(None),
            Err(e) => Err(BrokerError::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn bracket_request_derives_leg_prices() {
        let request = AlpacaBrokerAdapter::to_bracket_request(
            &Symbol::new("AAPL"),
            10,
            dec!(100),
            dec!(0.05),
            dec!(0.10),
            "rebal-test".to_string(),
        );

        assert_eq!(request.symbol, "AAPL");
        assert_eq!(request.qty, "10");
        assert_eq!(request.side, "buy");
        assert_eq!(request.order_type, "market");
        assert_eq!(request.time_in_force, "gtc");
        assert_eq!(request.order_class.as_deref(), Some("bracket"));
        assert_eq!(request.stop_loss.unwrap().stop_price, "95.00");
        assert_eq!(request.take_profit.unwrap().limit_price, "110.00");
    }

    #[test]
    fn bracket_leg_prices_round_to_cents() {
        let request = AlpacaBrokerAdapter::to_bracket_request(
            &Symbol::new("NVDA"),
            3,
            dec!(123.4567),
            dec!(0.05),
            dec!(0.10),
            "rebal-test".to_string(),
        );

        // 123.4567 * 0.95 = 117.283865 -> 117.28
        assert_eq!(request.stop_loss.unwrap().stop_price, "117.28");
        // 123.4567 * 1.10 = 135.80237 -> 135.80
        assert_eq!(request.take_profit.unwrap().limit_price, "135.80");
    }

    #[test]
    fn adapter_rejects_empty_credentials() {
        let config = AlpacaConfig::new(
            String::new(),
            String::new(),
            AlpacaEnvironment::Paper,
        );
        assert!(AlpacaBrokerAdapter::new(&config).is_err());
    }
}
