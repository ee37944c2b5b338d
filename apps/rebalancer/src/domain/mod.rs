//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure
//! dependencies. Everything here is pure and deterministic: the policy engine
//! and normalizer can be exercised without a network or a broker.
//!
//! # Modules
//!
//! - [`shared`]: Value objects shared across the domain (`Symbol`)
//! - [`recommendation`]: Canonical recommendation set + payload normalizer
//! - [`account`]: Broker-owned snapshots (positions, cash)
//! - [`policy`]: Entry/exit decisions, sizing, stop/target derivation

pub mod account;
pub mod policy;
pub mod recommendation;
pub mod shared;
