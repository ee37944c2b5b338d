//! Application Layer
//!
//! Orchestrates domain logic through use cases.
//!
//! - **Ports**: Interfaces for external systems
//! - **Use Cases**: The rebalance pass

pub mod ports;
pub mod use_cases;

pub use ports::*;
pub use use_cases::*;
