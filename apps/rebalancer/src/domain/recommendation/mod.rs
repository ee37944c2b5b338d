//! Canonical recommendation set and payload normalizer.
//!
//! Recommendation feeds arrive in heterogeneous JSON shapes depending on the
//! ranker that produced them: `{"ranked": [...]}`, `{"top": [...]}`,
//! `{"data": [...]}`, `{"recommendations": [...]}`, or a bare array. The
//! normalizer tries those shapes in priority order and produces one canonical
//! mapping of symbol to recommendation.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::shared::Symbol;

/// Top-level keys recognized as the list section, in priority order.
const LIST_KEYS: [&str; 4] = ["ranked", "top", "data", "recommendations"];

/// Normalization errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// The payload contains nothing iterable. A payload that parses but has
    /// zero usable entries is an empty set, not this error.
    #[error(
        "payload has no list-like section (expected one of `ranked`, `top`, `data`, \
         `recommendations`, or a bare array)"
    )]
    NoListSection,
}

/// A scored opinion about a ticker from an external ranking source.
///
/// Immutable within a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Symbol the recommendation is about.
    pub symbol: Symbol,
    /// Ranker confidence, roughly in `[0, 1]`. `None` means unknown and is
    /// treated as zero confidence downstream.
    pub score: Option<f64>,
    /// Free-form signal text ("whale_buy", "momentum sell", ...), preserved
    /// verbatim for case-insensitive substring matching.
    pub signal: Option<String>,
    /// Per-symbol stop-loss override (fraction of entry price).
    pub stop_loss_pct: Option<Decimal>,
    /// Per-symbol take-profit override (fraction of entry price).
    pub take_profit_pct: Option<Decimal>,
}

impl Recommendation {
    /// Create a recommendation with just a score.
    #[must_use]
    pub fn scored(symbol: impl Into<Symbol>, score: f64) -> Self {
        Self {
            symbol: symbol.into(),
            score: Some(score),
            signal: None,
            stop_loss_pct: None,
            take_profit_pct: None,
        }
    }

    /// Create a recommendation with a signal and no score.
    #[must_use]
    pub fn signaled(symbol: impl Into<Symbol>, signal: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            score: None,
            signal: Some(signal.into()),
            stop_loss_pct: None,
            take_profit_pct: None,
        }
    }
}

/// Canonical mapping of symbol to recommendation for one pass.
///
/// Keys are ordered so iteration and tie-breaking are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    entries: BTreeMap<Symbol, Recommendation>,
}

impl RecommendationSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize an arbitrary JSON payload into a canonical set.
    ///
    /// Entries without a usable `symbol`/`ticker` are skipped. Duplicate
    /// symbols within one payload: last occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::NoListSection`] when the payload contains no
    /// list-like section to iterate.
    pub fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        let items = list_section(payload).ok_or(PayloadError::NoListSection)?;

        let mut set = Self::new();
        for item in items {
            if let Some(rec) = parse_entry(item) {
                set.insert(rec);
            }
        }
        Ok(set)
    }

    /// Insert a recommendation, replacing any existing entry for the symbol.
    pub fn insert(&mut self, rec: Recommendation) {
        self.entries.insert(rec.symbol.clone(), rec);
    }

    /// Merge another set into this one.
    ///
    /// On a per-symbol conflict the entry with the higher score wins; a
    /// scored entry always beats an unscored one. Never an error.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for (symbol, incoming) in other.entries {
            match self.entries.get(&symbol) {
                Some(existing) if !outranks(&incoming, existing) => {}
                _ => {
                    self.entries.insert(symbol, incoming);
                }
            }
        }
        self
    }

    /// Look up the recommendation for a symbol.
    #[must_use]
    pub fn get(&self, symbol: &Symbol) -> Option<&Recommendation> {
        self.entries.get(symbol)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &Recommendation> {
        self.entries.values()
    }

    /// Entries sorted by score descending.
    ///
    /// Unscored entries sort last; ties break by symbol lexical order, so
    /// the result is deterministic for identical inputs.
    #[must_use]
    pub fn ranked(&self) -> Vec<&Recommendation> {
        let mut ranked: Vec<&Recommendation> = self.entries.values().collect();
        ranked.sort_by(|a, b| match (a.score, b.score) {
            (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.symbol.cmp(&b.symbol)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.symbol.cmp(&b.symbol),
        });
        ranked
    }
}

/// Find the list section of a payload.
fn list_section(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

/// Parse one payload entry; returns `None` when no usable symbol is present.
fn parse_entry(item: &Value) -> Option<Recommendation> {
    let obj = item.as_object()?;

    // First key wins: `symbol` over `ticker`, lookup case-insensitive.
    let raw_symbol = lookup(obj, "symbol")
        .or_else(|| lookup(obj, "ticker"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    let score = lookup(obj, "score")
        .or_else(|| lookup(obj, "confidence"))
        .and_then(coerce_score);

    let signal = lookup(obj, "signal")
        .or_else(|| lookup(obj, "reason"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(Recommendation {
        symbol: Symbol::new(raw_symbol),
        score,
        signal,
        stop_loss_pct: lookup(obj, "stop_loss_pct").and_then(coerce_decimal),
        take_profit_pct: lookup(obj, "take_profit_pct").and_then(coerce_decimal),
    })
}

/// Case-insensitive field lookup.
fn lookup<'a>(obj: &'a serde_json::Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Coerce a JSON value to a finite score. Coercion failure is `None`, never fatal.
fn coerce_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    score.filter(|s| s.is_finite())
}

/// Coerce a JSON value to a decimal fraction.
fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        Value::String(s) => s.trim().parse::<Decimal>().ok(),
        _ => None,
    }
}

/// Whether `incoming` should replace `existing` during a merge.
fn outranks(incoming: &Recommendation, existing: &Recommendation) -> bool {
    match (incoming.score, existing.score) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        _ => false,
    }
}
