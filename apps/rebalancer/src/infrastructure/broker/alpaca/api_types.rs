//! Alpaca API request and response types.
//!
//! These types map directly to Alpaca's REST wire format. Monetary fields
//! arrive as JSON strings; `Decimal` deserializes them either way.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Order Request Types
// ============================================================================

/// Bracket order request for the Alpaca API.
///
/// A bracket couples the entry with a stop-loss and a take-profit leg so the
/// position carries its protective exits from the moment it opens.
#[derive(Debug, Clone, Serialize)]
pub struct AlpacaOrderRequest {
    /// Stock symbol.
    pub symbol: String,
    /// Quantity (shares), as a string.
    pub qty: String,
    /// Order side ("buy" / "sell").
    pub side: String,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Time in force.
    pub time_in_force: String,
    /// Order class ("bracket" for protected entries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_class: Option<String>,
    /// Take-profit leg.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<TakeProfitLeg>,
    /// Stop-loss leg.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<StopLossLeg>,
    /// Client order ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

/// Take-profit leg of a bracket order.
#[derive(Debug, Clone, Serialize)]
pub struct TakeProfitLeg {
    /// Limit price, as a string with at most two decimal places.
    pub limit_price: String,
}

/// Stop-loss leg of a bracket order.
#[derive(Debug, Clone, Serialize)]
pub struct StopLossLeg {
    /// Stop price, as a string with at most two decimal places.
    pub stop_price: String,
}

// ============================================================================
// Order Response Types
// ============================================================================

/// Order response from the Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrderResponse {
    /// Broker order ID.
    pub id: String,
    /// Client order ID.
    #[serde(default)]
    pub client_order_id: Option<String>,
    /// Symbol.
    pub symbol: String,
    /// Order status.
    pub status: String,
}

// ============================================================================
// Account Types
// ============================================================================

/// Account response from the Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaAccountResponse {
    /// Account ID.
    pub id: String,
    /// Account status ("ACTIVE", ...).
    pub status: String,
    /// Account equity.
    pub equity: Decimal,
    /// Settled cash balance.
    pub cash: Decimal,
}

// ============================================================================
// Position Types
// ============================================================================

/// Position response from the Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaPositionResponse {
    /// Symbol.
    pub symbol: String,
    /// Quantity.
    pub qty: Decimal,
    /// Average entry price.
    #[serde(default)]
    pub avg_entry_price: Option<Decimal>,
}

// ============================================================================
// Market Data Types
// ============================================================================

/// Latest trade response from the Alpaca data API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaLatestTradeResponse {
    /// Symbol.
    #[serde(default)]
    pub symbol: Option<String>,
    /// The trade, absent when the symbol has not traded.
    #[serde(default)]
    pub trade: Option<AlpacaTrade>,
}

/// A single trade record.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaTrade {
    /// Trade price.
    #[serde(rename = "p")]
    pub price: Decimal,
}

// ============================================================================
// Error Types
// ============================================================================

/// Error response from the Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaErrorResponse {
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Error message.
    pub message: String,
}
