// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Rebalancer - Portfolio Rebalancing Controller
//!
//! Turns (ranked recommendations, broker account snapshot) into an ordered
//! list of exit and entry actions under portfolio-level risk constraints,
//! and submits them to a brokerage.
//!
//! # Architecture (Clean Architecture + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic (value objects, pure policy)
//!   - `recommendation`: Canonical recommendation set and payload normalizer
//!   - `policy`: Entry/exit thresholds, sizing, stop/target derivation
//!   - `account`: Broker-owned position and account snapshots
//!
//! - **Application**: Use cases and orchestration
//!   - `ports`: Interfaces for external systems (`BrokerPort`, `MarketDataPort`)
//!   - `use_cases`: The `Rebalance` pass (exits → refresh → entries → report)
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `broker`: Alpaca broker adapter (bracket orders)
//!   - `marketdata`: Alpaca latest-trade price lookup
//!   - `feed`: File-based recommendation feed with multi-source merge

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Configuration loading and validation.
pub mod config;

/// Tracing setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::account::{AccountState, Position};
pub use domain::policy::{Decision, DecisionAction, PolicyConfig, PolicyEngine};
pub use domain::recommendation::{PayloadError, Recommendation, RecommendationSet};
pub use domain::shared::{DomainError, Symbol};

// Application re-exports
pub use application::ports::{
    AccountSummary, BrokerError, BrokerPort, MarketDataError, MarketDataPort, OrderRef,
};
pub use application::use_cases::{PassAction, PassError, PassReport, RebalanceUseCase};

// Infrastructure re-exports
pub use infrastructure::broker::alpaca::{
    AlpacaBrokerAdapter, AlpacaConfig, AlpacaEnvironment, AlpacaError,
};
pub use infrastructure::feed::{FeedError, FileRecommendationFeed};
pub use infrastructure::marketdata::AlpacaMarketDataAdapter;
