//! Broker Port (Driven Port)
//!
//! Interface for interacting with a brokerage: account state reads and
//! order submission. The loop never mutates positions directly; it only
//! observes them on the next snapshot.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::account::Position;
use crate::domain::shared::Symbol;

/// Account summary returned by a successful authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Total account equity.
    pub equity: Decimal,
    /// Settled cash.
    pub cash: Decimal,
    /// Broker account status ("ACTIVE", ...).
    pub status: String,
}

/// Reference to an order accepted by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRef {
    /// Broker-assigned order ID.
    pub id: String,
    /// Client order ID we submitted, if any.
    pub client_order_id: Option<String>,
}

impl OrderRef {
    /// Create an order reference.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client_order_id: None,
        }
    }

    /// Attach the client order ID.
    #[must_use]
    pub fn with_client_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_order_id.into());
        self
    }
}

/// Broker port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Bad or missing credentials. Fatal to the pass.
    #[error("Broker authentication failed")]
    AuthenticationFailed,

    /// Connection error.
    #[error("Broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Order rejected by broker.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Rate limited.
    #[error("Rate limited by broker")]
    RateLimited,

    /// Unknown error.
    #[error("Broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

/// Port for broker interactions.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Verify credentials and fetch the account summary.
    async fn authenticate(&self) -> Result<AccountSummary, BrokerError>;

    /// Get settled cash available for new entries.
    async fn get_cash(&self) -> Result<Decimal, BrokerError>;

    /// Get all open positions keyed by symbol.
    async fn get_positions(&self) -> Result<BTreeMap<Symbol, Position>, BrokerError>;

    /// Submit a bracket market buy: entry plus stop-loss and take-profit legs
    /// derived multiplicatively from `entry_price`.
    async fn submit_buy(
        &self,
        symbol: &Symbol,
        qty: i64,
        entry_price: Decimal,
        stop_loss_pct: Decimal,
        take_profit_pct: Decimal,
    ) -> Result<OrderRef, BrokerError>;

    /// Liquidate the full position for `symbol`.
    ///
    /// Returns `Ok(None)` when no position exists (a no-op, not an error).
    async fn submit_sell_all(&self, symbol: &Symbol) -> Result<Option<OrderRef>, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ref_with_client_id() {
        let order = OrderRef::new("broker-123").with_client_id("client-456");
        assert_eq!(order.id, "broker-123");
        assert_eq!(order.client_order_id.as_deref(), Some("client-456"));
    }

    #[test]
    fn order_ref_without_client_id() {
        let order = OrderRef::new("broker-123");
        assert!(order.client_order_id.is_none());
    }

    #[test]
    fn broker_error_display() {
        assert_eq!(
            BrokerError::AuthenticationFailed.to_string(),
            "Broker authentication failed"
        );
        assert_eq!(
            BrokerError::OrderRejected {
                reason: "insufficient buying power".to_string()
            }
            .to_string(),
            "Order rejected: insufficient buying power"
        );
    }
}
