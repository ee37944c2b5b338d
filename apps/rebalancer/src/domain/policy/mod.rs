//! Policy Engine
//!
//! Pure decision logic: entry/exit thresholds, position sizing, and
//! stop/target derivation. No I/O, no clocks, no environment reads —
//! `decide` is deterministic given identical inputs, which is what makes the
//! pass testable without a broker.
//!
//! The entry threshold (`min_confidence`) and the exit threshold
//! (`exit_below_confidence`) are independent values. The gap between them is
//! the hysteresis band that keeps a position from being re-entered right
//! after it was exited for dipping below the entry bar, so validation must
//! never couple the two.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::domain::account::AccountState;
use crate::domain::recommendation::Recommendation;
use crate::domain::shared::Symbol;

/// Substring that marks a sell-type signal ("whale_sell", "sell pressure").
const SELL_TOKEN: &str = "sell";

/// Substring that marks a buy-type signal ("whale_buy", "insider buying").
const BUY_TOKEN: &str = "buy";

/// Process-wide risk policy, immutable for a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Limit of simultaneous positions.
    #[serde(default = "default_max_portfolio_size")]
    pub max_portfolio_size: usize,
    /// USD allocated per position at most.
    #[serde(default = "default_max_position_usd")]
    pub max_position_usd: Decimal,
    /// Minimum confidence required to enter.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Held positions scoring below this are exited.
    #[serde(default = "default_exit_below_confidence")]
    pub exit_below_confidence: f64,
    /// Default stop-loss, as a fraction of entry price.
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// Default take-profit, as a fraction of entry price.
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    /// Ceiling for per-symbol stop overrides; a stop is never looser than this.
    #[serde(default = "default_max_stop_loss_pct")]
    pub max_stop_loss_pct: Decimal,
}

fn default_max_portfolio_size() -> usize {
    5
}
fn default_max_position_usd() -> Decimal {
    Decimal::new(1000, 0)
}
fn default_min_confidence() -> f64 {
    0.7
}
fn default_exit_below_confidence() -> f64 {
    0.5
}
fn default_stop_loss_pct() -> Decimal {
    Decimal::new(5, 2) // 5%
}
fn default_take_profit_pct() -> Decimal {
    Decimal::new(10, 2) // 10%
}
fn default_max_stop_loss_pct() -> Decimal {
    Decimal::new(20, 2) // 20%
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_portfolio_size: default_max_portfolio_size(),
            max_position_usd: default_max_position_usd(),
            min_confidence: default_min_confidence(),
            exit_below_confidence: default_exit_below_confidence(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            max_stop_loss_pct: default_max_stop_loss_pct(),
        }
    }
}

/// What to do with one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    /// Open a new position.
    Buy,
    /// Keep the held position.
    Hold,
    /// Liquidate the held position.
    Exit,
    /// Do nothing; reason says why.
    Skip,
}

impl std::fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Hold => write!(f, "hold"),
            Self::Exit => write!(f, "exit"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Result of applying policy to one symbol. Ephemeral within a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Chosen action.
    pub action: DecisionAction,
    /// Shares to buy (0 unless `action == Buy`).
    pub qty: i64,
    /// Stop-loss fraction for the bracket (0 unless `action == Buy`).
    pub stop_loss_pct: Decimal,
    /// Take-profit fraction for the bracket (0 unless `action == Buy`).
    pub take_profit_pct: Decimal,
    /// Human-readable cause, surfaced in the pass report.
    pub reason: String,
}

impl Decision {
    fn buy(qty: i64, stop_loss_pct: Decimal, take_profit_pct: Decimal, reason: String) -> Self {
        Self {
            action: DecisionAction::Buy,
            qty,
            stop_loss_pct,
            take_profit_pct,
            reason,
        }
    }

    fn hold() -> Self {
        Self {
            action: DecisionAction::Hold,
            qty: 0,
            stop_loss_pct: Decimal::ZERO,
            take_profit_pct: Decimal::ZERO,
            reason: "holding".to_string(),
        }
    }

    fn exit(reason: String) -> Self {
        Self {
            action: DecisionAction::Exit,
            qty: 0,
            stop_loss_pct: Decimal::ZERO,
            take_profit_pct: Decimal::ZERO,
            reason,
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Skip,
            qty: 0,
            stop_loss_pct: Decimal::ZERO,
            take_profit_pct: Decimal::ZERO,
            reason: reason.into(),
        }
    }
}

/// Stop price derived multiplicatively from the entry price.
#[must_use]
pub fn stop_price(entry_price: Decimal, stop_loss_pct: Decimal) -> Decimal {
    entry_price * (Decimal::ONE - stop_loss_pct)
}

/// Target price derived multiplicatively from the entry price.
#[must_use]
pub fn target_price(entry_price: Decimal, take_profit_pct: Decimal) -> Decimal {
    entry_price * (Decimal::ONE + take_profit_pct)
}

/// The pure decision engine.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    /// Create an engine for one pass.
    #[must_use]
    pub const fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// The policy this engine applies.
    #[must_use]
    pub const fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Whether a held position should be liquidated.
    ///
    /// True when the signal carries a sell token, the score is unknown, or
    /// the score fell below `exit_below_confidence`. Total: no input
    /// combination panics.
    #[must_use]
    pub fn should_exit(&self, score: Option<f64>, signal: Option<&str>) -> bool {
        self.exit_reason(score, signal).is_some()
    }

    /// Exit cause, or `None` when the position should be kept.
    ///
    /// A sell signal takes precedence over the score in the reason text;
    /// both are equivalent in effect.
    #[must_use]
    pub fn exit_reason(&self, score: Option<f64>, signal: Option<&str>) -> Option<String> {
        if let Some(signal) = signal
            && has_token(signal, SELL_TOKEN)
        {
            return Some(format!("sell signal: {signal}"));
        }
        match score {
            None => Some("no score".to_string()),
            Some(score) if score < self.config.exit_below_confidence => Some(format!(
                "score {score} below exit threshold {}",
                self.config.exit_below_confidence
            )),
            Some(_) => None,
        }
    }

    /// Whether a symbol qualifies for entry.
    ///
    /// A score at or above `min_confidence` qualifies. A buy-type signal
    /// ("whale_buy") overrides the numeric floor, unless a sell token is
    /// also present.
    #[must_use]
    pub fn should_enter(&self, score: Option<f64>, signal: Option<&str>) -> bool {
        if score.is_some_and(|s| s >= self.config.min_confidence) {
            return true;
        }
        signal.is_some_and(|s| has_token(s, BUY_TOKEN) && !has_token(s, SELL_TOKEN))
    }

    /// Shares affordable under `min(cash, cap)` at `price`.
    ///
    /// A price of zero or less yields 0 — stale feeds can report zero and
    /// that must not be an error.
    #[must_use]
    pub fn position_size(cash: Decimal, price: Decimal, max_position_usd: Decimal) -> i64 {
        if price <= Decimal::ZERO {
            return 0;
        }
        let allocated = cash.min(max_position_usd);
        if allocated <= Decimal::ZERO {
            return 0;
        }
        (allocated / price).floor().to_i64().unwrap_or(0).max(0)
    }

    /// Effective stop-loss fraction for a recommendation.
    ///
    /// A per-symbol override takes precedence, clamped so the stop is never
    /// looser than `max_stop_loss_pct`; a non-positive override is ignored.
    #[must_use]
    pub fn stop_loss_for(&self, rec: Option<&Recommendation>) -> Decimal {
        rec.and_then(|r| r.stop_loss_pct)
            .filter(|pct| *pct > Decimal::ZERO)
            .map_or(self.config.stop_loss_pct, |pct| {
                pct.min(self.config.max_stop_loss_pct)
            })
    }

    /// Effective take-profit fraction for a recommendation.
    #[must_use]
    pub fn take_profit_for(&self, rec: Option<&Recommendation>) -> Decimal {
        rec.and_then(|r| r.take_profit_pct)
            .filter(|pct| *pct > Decimal::ZERO)
            .unwrap_or(self.config.take_profit_pct)
    }

    /// Apply policy to one symbol.
    ///
    /// `account` is whatever snapshot the caller treats as current — during
    /// the entry phase that is the locally tracked running budget, not a
    /// fresh broker read.
    #[must_use]
    pub fn decide(
        &self,
        symbol: &Symbol,
        rec: Option<&Recommendation>,
        price: Decimal,
        account: &AccountState,
    ) -> Decision {
        let score = rec.and_then(|r| r.score);
        let signal = rec.and_then(|r| r.signal.as_deref());

        if account.holds(symbol) {
            return match self.exit_reason(score, signal) {
                Some(reason) => Decision::exit(reason),
                None => Decision::hold(),
            };
        }

        if account.position_count() >= self.config.max_portfolio_size {
            return Decision::skip("portfolio full");
        }

        if self.should_enter(score, signal) {
            let qty = Self::position_size(account.cash, price, self.config.max_position_usd);
            if qty > 0 {
                let reason = match score {
                    Some(score) => format!("score {score} >= {}", self.config.min_confidence),
                    None => format!("buy signal: {}", signal.unwrap_or_default()),
                };
                return Decision::buy(
                    qty,
                    self.stop_loss_for(rec),
                    self.take_profit_for(rec),
                    reason,
                );
            }
            return Decision::skip("qty<=0");
        }

        Decision::skip("below entry threshold")
    }
}

/// Case-insensitive substring match.
fn has_token(signal: &str, token: &str) -> bool {
    signal.to_lowercase().contains(token)
}
