//! Application Use Cases

mod rebalance;

pub use rebalance::{PassAction, PassError, PassReport, RebalanceUseCase};
