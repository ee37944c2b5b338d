//! Shared Domain Types
//!
//! Value objects and errors shared across the domain.

pub mod errors;
pub mod symbol;

pub use errors::DomainError;
pub use symbol::Symbol;
