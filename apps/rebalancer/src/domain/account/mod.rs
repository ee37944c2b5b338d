//! Broker-owned account snapshots.
//!
//! The engine only reads these; mutation happens as a side effect of
//! submitted orders and is observed on the next snapshot.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::Symbol;

/// An open, broker-held holding of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Symbol held.
    pub symbol: Symbol,
    /// Number of shares held (always positive; the engine is long-only).
    pub qty: i64,
    /// Average entry price, when the broker reports one.
    pub entry_price: Option<Decimal>,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(symbol: Symbol, qty: i64, entry_price: Option<Decimal>) -> Self {
        Self {
            symbol,
            qty,
            entry_price,
        }
    }
}

/// A consistent snapshot of the account taken at one point in a pass.
///
/// The pass takes two snapshots (pre-exit, post-exit); the post-exit one is
/// the ground truth for entry-phase capital and open slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Settled cash available for new entries.
    pub cash: Decimal,
    /// Open positions keyed by symbol (ordered for deterministic iteration).
    pub positions: BTreeMap<Symbol, Position>,
}

impl AccountState {
    /// Create a new account snapshot.
    #[must_use]
    pub const fn new(cash: Decimal, positions: BTreeMap<Symbol, Position>) -> Self {
        Self { cash, positions }
    }

    /// Number of open positions.
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Whether the account currently holds `symbol`.
    #[must_use]
    pub fn holds(&self, symbol: &Symbol) -> bool {
        self.positions.contains_key(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot() -> AccountState {
        let mut positions = BTreeMap::new();
        positions.insert(
            Symbol::new("AAPL"),
            Position::new(Symbol::new("AAPL"), 3, Some(dec!(190.50))),
        );
        AccountState::new(dec!(2500), positions)
    }

    #[test]
    fn holds_is_case_normalized() {
        let account = snapshot();
        assert!(account.holds(&Symbol::new("aapl")));
        assert!(!account.holds(&Symbol::new("MSFT")));
    }

    #[test]
    fn position_count() {
        assert_eq!(snapshot().position_count(), 1);
        assert_eq!(AccountState::new(dec!(0), BTreeMap::new()).position_count(), 0);
    }
}
