//! Alpaca Markets broker integration.
//!
//! REST adapter for the Alpaca trading API: account reads, full-position
//! liquidations, and bracket order entries.

mod adapter;
pub(crate) mod api_types;
mod config;
mod error;
pub(crate) mod http_client;

pub use adapter::AlpacaBrokerAdapter;
pub use config::{AlpacaConfig, AlpacaEnvironment, RetryConfig};
pub use error::AlpacaError;
