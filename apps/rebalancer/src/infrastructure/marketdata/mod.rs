//! Market data adapters.

mod alpaca;

pub use alpaca::AlpacaMarketDataAdapter;
