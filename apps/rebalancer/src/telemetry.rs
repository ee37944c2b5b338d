//! Tracing Setup
//!
//! Console-only structured logging.
//!
//! # Configuration
//!
//! - `RUST_LOG`: overrides the configured level filter when set
//!
//! # Usage
//!
//! ```rust,ignore
//! use rebalancer::telemetry::init_telemetry;
//!
//! fn main() {
//!     init_telemetry("info");
//!     // ... application code
//! }
//! ```

use tracing_subscriber::EnvFilter;

/// Initialize console tracing.
///
/// `default_level` applies when `RUST_LOG` is unset; any valid `EnvFilter`
/// directive string works ("info", "rebalancer=debug", ...).
pub fn init_telemetry(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let is_development = std::env::var("REBALANCER_DEV")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(!is_development)
        .with_ansi(is_development)
        .init();
}
