//! Application Ports (Driven)
//!
//! Ports define the capability set the reconciliation loop depends on.
//! Concrete adapters live in the infrastructure layer; tests satisfy the
//! same traits with in-memory mocks.

mod broker_port;
mod market_data_port;

pub use broker_port::{AccountSummary, BrokerError, BrokerPort, OrderRef};
pub use market_data_port::{MarketDataError, MarketDataPort};
