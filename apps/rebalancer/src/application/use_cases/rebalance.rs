//! Rebalance Use Case
//!
//! One reconciliation pass, five strictly ordered phases:
//!
//! 1. **Load**: authenticate, snapshot cash and positions
//! 2. **Exit evaluation**: liquidate held symbols the policy rejects
//! 3. **Refresh**: re-read cash/positions so exit proceeds are visible
//! 4. **Entry evaluation**: walk ranked candidates against a locally
//!    tracked running budget
//! 5. **Report**: the ordered action list, the externally observable result
//!
//! Exits and entries are separate phases, not interleaved per symbol: entry
//! sizing must see post-exit capital, and that boundary is the phase-3
//! refresh. During phase 4 the loop owns a running `(cash, positions)` view
//! and does not re-query the broker per order, to bound latency and API call
//! volume.
//!
//! The pass is stateless across invocations; all state of record lives at
//! the broker.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{BrokerError, BrokerPort, MarketDataPort};
use crate::domain::account::{AccountState, Position};
use crate::domain::policy::{Decision, DecisionAction, PolicyConfig, PolicyEngine};
use crate::domain::recommendation::{Recommendation, RecommendationSet};
use crate::domain::shared::Symbol;

/// Fatal pass errors. Per-symbol failures never surface here; they are
/// swallowed at the narrowest scope and recorded as action reasons.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// Broker authentication or connectivity failure during load/refresh.
    #[error("broker unavailable: {0}")]
    Broker(#[from] BrokerError),
}

/// One recorded action of a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassAction {
    /// Symbol the action concerns.
    pub symbol: Symbol,
    /// What was done (or would be done, in dry-run).
    pub action: DecisionAction,
    /// Shares bought, for buys.
    pub qty: Option<i64>,
    /// Price used for sizing, for buys.
    pub price: Option<Decimal>,
    /// Cause, including any swallowed per-symbol error.
    pub reason: String,
}

impl PassAction {
    fn buy(symbol: Symbol, qty: i64, price: Decimal, reason: String) -> Self {
        Self {
            symbol,
            action: DecisionAction::Buy,
            qty: Some(qty),
            price: Some(price),
            reason,
        }
    }

    fn hold(symbol: Symbol) -> Self {
        Self {
            symbol,
            action: DecisionAction::Hold,
            qty: None,
            price: None,
            reason: "holding".to_string(),
        }
    }

    fn exit(symbol: Symbol, reason: String) -> Self {
        Self {
            symbol,
            action: DecisionAction::Exit,
            qty: None,
            price: None,
            reason,
        }
    }

    fn skip(symbol: Symbol, reason: impl Into<String>) -> Self {
        Self {
            symbol,
            action: DecisionAction::Skip,
            qty: None,
            price: None,
            reason: reason.into(),
        }
    }
}

/// Result of one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// Whether submissions were suppressed.
    pub dry_run: bool,
    /// Ordered actions taken (or simulated).
    pub actions: Vec<PassAction>,
    /// Cash at phase-1 load.
    pub cash_before: Decimal,
    /// Running cash after the entry phase.
    pub cash_after: Decimal,
    /// Open positions at phase-1 load.
    pub positions_before: usize,
    /// Open positions after the entry phase (locally tracked).
    pub positions_after: usize,
}

impl PassReport {
    /// Accepted buys in this pass.
    #[must_use]
    pub fn buys(&self) -> usize {
        self.count(DecisionAction::Buy)
    }

    /// Submitted exits in this pass.
    #[must_use]
    pub fn exits(&self) -> usize {
        self.count(DecisionAction::Exit)
    }

    fn count(&self, action: DecisionAction) -> usize {
        self.actions.iter().filter(|a| a.action == action).count()
    }
}

/// Use case executing one rebalance pass against broker and market data ports.
pub struct RebalanceUseCase<B, M>
where
    B: BrokerPort,
    M: MarketDataPort,
{
    broker: Arc<B>,
    market_data: Arc<M>,
    engine: PolicyEngine,
    dry_run: bool,
}

impl<B, M> RebalanceUseCase<B, M>
where
    B: BrokerPort,
    M: MarketDataPort,
{
    /// Create a new RebalanceUseCase.
    pub fn new(broker: Arc<B>, market_data: Arc<M>, config: PolicyConfig, dry_run: bool) -> Self {
        Self {
            broker,
            market_data,
            engine: PolicyEngine::new(config),
            dry_run,
        }
    }

    /// Execute one pass.
    ///
    /// # Errors
    ///
    /// Returns [`PassError::Broker`] when authentication or a load/refresh
    /// read fails; nothing is submitted past that point. Per-symbol failures
    /// are recorded in the report instead.
    pub async fn execute(&self, recs: &RecommendationSet) -> Result<PassReport, PassError> {
        let started_at = Utc::now();

        // Phase 1: load.
        let summary = self.broker.authenticate().await?;
        tracing::info!(
            equity = %summary.equity,
            cash = %summary.cash,
            status = %summary.status,
            dry_run = self.dry_run,
            "Broker authenticated, starting pass"
        );

        let cash_before = self.broker.get_cash().await?;
        let positions = self.broker.get_positions().await?;
        let positions_before = positions.len();
        let account = AccountState::new(cash_before, positions);

        let mut actions = Vec::new();

        // Phase 2: exit evaluation, in held (symbol) order.
        for symbol in account.positions.keys() {
            let rec = recs.get(symbol);
            let decision = self.engine.decide(symbol, rec, Decimal::ZERO, &account);
            match decision.action {
                DecisionAction::Exit => {
                    actions.push(self.liquidate(symbol, decision.reason).await);
                }
                _ => {
                    tracing::debug!(symbol = %symbol, "Holding position");
                    actions.push(PassAction::hold(symbol.clone()));
                }
            }
        }

        // Phase 3: refresh, so entry sizing sees post-exit capital.
        let cash = self.broker.get_cash().await?;
        let positions = self.broker.get_positions().await?;
        let mut running = AccountState::new(cash, positions);

        // Phase 4: entry evaluation against the running budget.
        let max_portfolio_size = self.engine.config().max_portfolio_size;
        for rec in recs.ranked() {
            if running.holds(&rec.symbol) {
                continue;
            }

            if running.position_count() >= max_portfolio_size {
                // No price lookup for candidates that cannot fit anyway.
                actions.push(PassAction::skip(rec.symbol.clone(), "portfolio full"));
                continue;
            }

            let price = match self.market_data.get_price(&rec.symbol).await {
                Ok(Some(price)) => price,
                Ok(None) => {
                    tracing::warn!(symbol = %rec.symbol, "No price available");
                    actions.push(PassAction::skip(rec.symbol.clone(), "no_price"));
                    continue;
                }
                Err(e) => {
                    tracing::warn!(symbol = %rec.symbol, error = %e, "Price lookup failed");
                    actions.push(PassAction::skip(rec.symbol.clone(), "no_price"));
                    continue;
                }
            };

            let decision = self.engine.decide(&rec.symbol, Some(rec), price, &running);
            if decision.action == DecisionAction::Buy {
                if let Some(action) = self.enter(rec, &decision, price).await {
                    running.cash -= Decimal::from(decision.qty) * price;
                    running.positions.insert(
                        rec.symbol.clone(),
                        Position::new(rec.symbol.clone(), decision.qty, Some(price)),
                    );
                    actions.push(action);
                } else {
                    // Submission failed; budget is not consumed.
                    actions.push(PassAction::skip(rec.symbol.clone(), "buy submit failed"));
                }
            } else {
                tracing::debug!(symbol = %rec.symbol, reason = %decision.reason, "Skipping candidate");
                actions.push(PassAction::skip(rec.symbol.clone(), decision.reason));
            }
        }

        // Phase 5: report.
        let report = PassReport {
            started_at,
            dry_run: self.dry_run,
            actions,
            cash_before,
            cash_after: running.cash,
            positions_before,
            positions_after: running.position_count(),
        };
        tracing::info!(
            exits = report.exits(),
            buys = report.buys(),
            cash_before = %report.cash_before,
            cash_after = %report.cash_after,
            positions_before = report.positions_before,
            positions_after = report.positions_after,
            dry_run = report.dry_run,
            "Pass complete"
        );
        Ok(report)
    }

    /// Submit a full liquidation; failures degrade that symbol only.
    async fn liquidate(&self, symbol: &Symbol, reason: String) -> PassAction {
        tracing::info!(symbol = %symbol, reason = %reason, "Exiting position");
        if self.dry_run {
            return PassAction::exit(symbol.clone(), reason);
        }
        match self.broker.submit_sell_all(symbol).await {
            Ok(Some(order)) => {
                tracing::info!(symbol = %symbol, order_id = %order.id, "Liquidation submitted");
                PassAction::exit(symbol.clone(), reason)
            }
            Ok(None) => {
                tracing::warn!(symbol = %symbol, "No position at broker, nothing to liquidate");
                PassAction::skip(symbol.clone(), "no position at broker")
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Liquidation failed");
                PassAction::skip(symbol.clone(), format!("exit failed: {e}"))
            }
        }
    }

    /// Submit a bracket buy; returns `None` when the submission failed.
    async fn enter(
        &self,
        rec: &Recommendation,
        decision: &Decision,
        price: Decimal,
    ) -> Option<PassAction> {
        tracing::info!(
            symbol = %rec.symbol,
            qty = decision.qty,
            price = %price,
            reason = %decision.reason,
            "Entering position"
        );
        if self.dry_run {
            return Some(PassAction::buy(
                rec.symbol.clone(),
                decision.qty,
                price,
                decision.reason.clone(),
            ));
        }
        match self
            .broker
            .submit_buy(
                &rec.symbol,
                decision.qty,
                price,
                decision.stop_loss_pct,
                decision.take_profit_pct,
            )
            .await
        {
            Ok(order) => {
                tracing::info!(symbol = %rec.symbol, order_id = %order.id, "Buy submitted");
                Some(PassAction::buy(
                    rec.symbol.clone(),
                    decision.qty,
                    price,
                    decision.reason.clone(),
                ))
            }
            Err(e) => {
                tracing::warn!(symbol = %rec.symbol, error = %e, "Buy failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{AccountSummary, MarketDataError, OrderRef};
    use crate::domain::recommendation::Recommendation;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::RwLock;

    struct MockBroker {
        cash: RwLock<Decimal>,
        positions: RwLock<BTreeMap<Symbol, Position>>,
        submitted_buys: RwLock<Vec<(Symbol, i64)>>,
        submitted_sells: RwLock<Vec<Symbol>>,
        fail_auth: bool,
        fail_sells: HashSet<Symbol>,
        fail_buys: HashSet<Symbol>,
    }

    impl MockBroker {
        fn new(cash: Decimal, positions: Vec<(&str, i64, Decimal)>) -> Self {
            let positions = positions
                .into_iter()
                .map(|(s, qty, entry)| {
                    let symbol = Symbol::new(s);
                    (symbol.clone(), Position::new(symbol, qty, Some(entry)))
                })
                .collect();
            Self {
                cash: RwLock::new(cash),
                positions: RwLock::new(positions),
                submitted_buys: RwLock::new(vec![]),
                submitted_sells: RwLock::new(vec![]),
                fail_auth: false,
                fail_sells: HashSet::new(),
                fail_buys: HashSet::new(),
            }
        }

        fn failing_auth() -> Self {
            let mut broker = Self::new(Decimal::ZERO, vec![]);
            broker.fail_auth = true;
            broker
        }

        fn with_failing_sell(mut self, symbol: &str) -> Self {
            self.fail_sells.insert(Symbol::new(symbol));
            self
        }

        fn with_failing_buy(mut self, symbol: &str) -> Self {
            self.fail_buys.insert(Symbol::new(symbol));
            self
        }
    }

    #[async_trait]
    impl BrokerPort for MockBroker {
        async fn authenticate(&self) -> Result<AccountSummary, BrokerError> {
            if self.fail_auth {
                return Err(BrokerError::AuthenticationFailed);
            }
            Ok(AccountSummary {
                equity: *self.cash.read().unwrap(),
                cash: *self.cash.read().unwrap(),
                status: "ACTIVE".to_string(),
            })
        }

        async fn get_cash(&self) -> Result<Decimal, BrokerError> {
            Ok(*self.cash.read().unwrap())
        }

        async fn get_positions(&self) -> Result<BTreeMap<Symbol, Position>, BrokerError> {
            Ok(self.positions.read().unwrap().clone())
        }

        async fn submit_buy(
            &self,
            symbol: &Symbol,
            qty: i64,
            entry_price: Decimal,
            _stop_loss_pct: Decimal,
            _take_profit_pct: Decimal,
        ) -> Result<OrderRef, BrokerError> {
            if self.fail_buys.contains(symbol) {
                return Err(BrokerError::OrderRejected {
                    reason: "rejected".to_string(),
                });
            }
            self.submitted_buys
                .write()
                .unwrap()
                .push((symbol.clone(), qty));
            *self.cash.write().unwrap() -= Decimal::from(qty) * entry_price;
            self.positions.write().unwrap().insert(
                symbol.clone(),
                Position::new(symbol.clone(), qty, Some(entry_price)),
            );
            Ok(OrderRef::new(format!("order-{symbol}")))
        }

        async fn submit_sell_all(
            &self,
            symbol: &Symbol,
        ) -> Result<Option<OrderRef>, BrokerError> {
            if self.fail_sells.contains(symbol) {
                return Err(BrokerError::ConnectionError {
                    message: "timeout".to_string(),
                });
            }
            let removed = self.positions.write().unwrap().remove(symbol);
            match removed {
                Some(position) => {
                    // Credit proceeds so the refresh sees post-exit capital.
                    let proceeds =
                        Decimal::from(position.qty) * position.entry_price.unwrap_or_default();
                    *self.cash.write().unwrap() += proceeds;
                    self.submitted_sells.write().unwrap().push(symbol.clone());
                    Ok(Some(OrderRef::new(format!("sell-{symbol}"))))
                }
                None => Ok(None),
            }
        }
    }

    struct MockMarketData {
        prices: HashMap<Symbol, Decimal>,
    }

    impl MockMarketData {
        fn new(prices: Vec<(&str, Decimal)>) -> Self {
            Self {
                prices: prices
                    .into_iter()
                    .map(|(s, p)| (Symbol::new(s), p))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl MarketDataPort for MockMarketData {
        async fn get_price(&self, symbol: &Symbol) -> Result<Option<Decimal>, MarketDataError> {
            Ok(self.prices.get(symbol).copied())
        }
    }

    fn use_case(
        broker: MockBroker,
        market_data: MockMarketData,
        config: PolicyConfig,
        dry_run: bool,
    ) -> RebalanceUseCase<MockBroker, MockMarketData> {
        RebalanceUseCase::new(Arc::new(broker), Arc::new(market_data), config, dry_run)
    }

    fn recs(entries: Vec<Recommendation>) -> RecommendationSet {
        let mut set = RecommendationSet::new();
        for rec in entries {
            set.insert(rec);
        }
        set
    }

    #[tokio::test]
    async fn full_pass_exits_then_enters() {
        // AAPL held with a bad score gets exited; NVDA gets bought with the
        // freed capital visible after the refresh.
        let broker = MockBroker::new(dec!(100), vec![("AAPL", 10, dec!(90))]);
        let market_data = MockMarketData::new(vec![("NVDA", dec!(100))]);
        let set = recs(vec![
            Recommendation::scored("AAPL", 0.3),
            Recommendation::scored("NVDA", 0.9),
        ]);

        let uc = use_case(broker, market_data, PolicyConfig::default(), false);
        let report = uc.execute(&set).await.unwrap();

        assert_eq!(report.exits(), 1);
        assert_eq!(report.buys(), 1);
        assert_eq!(report.positions_before, 1);
        assert_eq!(report.positions_after, 1);
        assert_eq!(report.cash_before, dec!(100));

        // Post-exit capital: 100 + 10*90 = 1000 -> 10 shares of NVDA at 100.
        let buy = report
            .actions
            .iter()
            .find(|a| a.action == DecisionAction::Buy)
            .unwrap();
        assert_eq!(buy.symbol, Symbol::new("NVDA"));
        assert_eq!(buy.qty, Some(10));
        assert_eq!(report.cash_after, dec!(0));
    }

    #[tokio::test]
    async fn auth_failure_is_fatal() {
        let uc = use_case(
            MockBroker::failing_auth(),
            MockMarketData::new(vec![]),
            PolicyConfig::default(),
            false,
        );
        let result = uc.execute(&RecommendationSet::new()).await;
        assert!(matches!(
            result,
            Err(PassError::Broker(BrokerError::AuthenticationFailed))
        ));
    }

    #[tokio::test]
    async fn one_failed_exit_does_not_abort_the_rest() {
        let broker = MockBroker::new(
            dec!(0),
            vec![("AAPL", 1, dec!(100)), ("MSFT", 1, dec!(100))],
        )
        .with_failing_sell("AAPL");
        let uc = use_case(
            broker,
            MockMarketData::new(vec![]),
            PolicyConfig::default(),
            false,
        );

        // Neither symbol is recommended, so both should be exited.
        let report = uc.execute(&RecommendationSet::new()).await.unwrap();

        let aapl = report
            .actions
            .iter()
            .find(|a| a.symbol == Symbol::new("AAPL"))
            .unwrap();
        assert_eq!(aapl.action, DecisionAction::Skip);
        assert!(aapl.reason.contains("exit failed"));

        let msft = report
            .actions
            .iter()
            .find(|a| a.symbol == Symbol::new("MSFT"))
            .unwrap();
        assert_eq!(msft.action, DecisionAction::Exit);
    }

    #[tokio::test]
    async fn entry_phase_respects_portfolio_cap() {
        let config = PolicyConfig {
            max_portfolio_size: 2,
            ..PolicyConfig::default()
        };
        // One held (and healthy), three qualifying candidates: only one slot.
        let broker = MockBroker::new(dec!(10_000), vec![("AAPL", 1, dec!(100))]);
        let market_data = MockMarketData::new(vec![
            ("NVDA", dec!(100)),
            ("MSFT", dec!(100)),
            ("AMD", dec!(100)),
        ]);
        let set = recs(vec![
            Recommendation::scored("AAPL", 0.9),
            Recommendation::scored("NVDA", 0.95),
            Recommendation::scored("MSFT", 0.9),
            Recommendation::scored("AMD", 0.85),
        ]);

        let uc = use_case(broker, market_data, config, false);
        let report = uc.execute(&set).await.unwrap();

        assert_eq!(report.buys(), 1);
        // Best-ranked candidate won the slot.
        let buy = report
            .actions
            .iter()
            .find(|a| a.action == DecisionAction::Buy)
            .unwrap();
        assert_eq!(buy.symbol, Symbol::new("NVDA"));

        // Remaining candidates are reported as portfolio-full skips.
        let full_skips = report
            .actions
            .iter()
            .filter(|a| a.reason == "portfolio full")
            .count();
        assert_eq!(full_skips, 2);
    }

    #[tokio::test]
    async fn missing_price_skips_symbol_only() {
        let broker = MockBroker::new(dec!(10_000), vec![]);
        // NVDA has no price; MSFT does.
        let market_data = MockMarketData::new(vec![("MSFT", dec!(100))]);
        let set = recs(vec![
            Recommendation::scored("NVDA", 0.95),
            Recommendation::scored("MSFT", 0.9),
        ]);

        let uc = use_case(broker, market_data, PolicyConfig::default(), false);
        let report = uc.execute(&set).await.unwrap();

        let nvda = report
            .actions
            .iter()
            .find(|a| a.symbol == Symbol::new("NVDA"))
            .unwrap();
        assert_eq!(nvda.action, DecisionAction::Skip);
        assert_eq!(nvda.reason, "no_price");
        assert_eq!(report.buys(), 1);
    }

    #[tokio::test]
    async fn running_budget_serializes_entries() {
        // cash=1000, two candidates at $600: the second must see the
        // depleted budget and be skipped with qty<=0.
        let config = PolicyConfig {
            max_position_usd: dec!(1000),
            ..PolicyConfig::default()
        };
        let broker = MockBroker::new(dec!(1000), vec![]);
        let market_data = MockMarketData::new(vec![("AAA", dec!(600)), ("BBB", dec!(600))]);
        let set = recs(vec![
            Recommendation::scored("AAA", 0.9),
            Recommendation::scored("BBB", 0.8),
        ]);

        let uc = use_case(broker, market_data, config, false);
        let report = uc.execute(&set).await.unwrap();

        assert_eq!(report.buys(), 1);
        let bbb = report
            .actions
            .iter()
            .find(|a| a.symbol == Symbol::new("BBB"))
            .unwrap();
        assert_eq!(bbb.reason, "qty<=0");
        assert_eq!(report.cash_after, dec!(400));
    }

    #[tokio::test]
    async fn failed_buy_does_not_consume_budget() {
        let broker =
            MockBroker::new(dec!(1000), vec![]).with_failing_buy("AAA");
        let market_data = MockMarketData::new(vec![("AAA", dec!(100)), ("BBB", dec!(100))]);
        let set = recs(vec![
            Recommendation::scored("AAA", 0.9),
            Recommendation::scored("BBB", 0.8),
        ]);

        let uc = use_case(broker, market_data, PolicyConfig::default(), false);
        let report = uc.execute(&set).await.unwrap();

        let aaa = report
            .actions
            .iter()
            .find(|a| a.symbol == Symbol::new("AAA"))
            .unwrap();
        assert_eq!(aaa.action, DecisionAction::Skip);
        assert!(aaa.reason.contains("buy submit failed"));

        // BBB still gets the full budget.
        let bbb = report
            .actions
            .iter()
            .find(|a| a.symbol == Symbol::new("BBB"))
            .unwrap();
        assert_eq!(bbb.qty, Some(10));
    }

    #[tokio::test]
    async fn dry_run_produces_report_without_side_effects() {
        let broker = MockBroker::new(dec!(1000), vec![("AAPL", 5, dec!(100))]);
        let market_data = MockMarketData::new(vec![("NVDA", dec!(100))]);
        let set = recs(vec![
            Recommendation::scored("AAPL", 0.2),
            Recommendation::scored("NVDA", 0.9),
        ]);

        let uc = use_case(broker, market_data, PolicyConfig::default(), true);
        let report = uc.execute(&set).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.exits(), 1);
        assert_eq!(report.buys(), 1);
        assert!(uc.broker.submitted_sells.read().unwrap().is_empty());
        assert!(uc.broker.submitted_buys.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_recommendations_empty_account_is_a_clean_pass() {
        // Scenario E: an empty (but valid) feed completes with zero actions.
        let uc = use_case(
            MockBroker::new(dec!(5000), vec![]),
            MockMarketData::new(vec![]),
            PolicyConfig::default(),
            false,
        );
        let report = uc.execute(&RecommendationSet::new()).await.unwrap();
        assert!(report.actions.is_empty());
        assert_eq!(report.cash_before, report.cash_after);
    }

    #[tokio::test]
    async fn healthy_positions_are_reported_as_holds() {
        let broker = MockBroker::new(dec!(0), vec![("AAPL", 5, dec!(100))]);
        let uc = use_case(
            broker,
            MockMarketData::new(vec![]),
            PolicyConfig::default(),
            false,
        );
        let set = recs(vec![Recommendation::scored("AAPL", 0.9)]);

        let report = uc.execute(&set).await.unwrap();
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].action, DecisionAction::Hold);
        assert_eq!(report.positions_after, 1);
    }
}
