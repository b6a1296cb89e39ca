//! Turns an approved decision set into holdings and ledger mutations.
//!
//! Sells run first to free capital, then an optional cooldown, then buys in
//! proposer order. Each leg stands alone: a failed price fetch, order or
//! write skips that decision and the batch carries on. Every decision ends
//! up in the trade journal with a typed reason.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use tradeguard_core::error::StoreError;
use tradeguard_core::types::{
    Action, ExecutionRecord, ExecutionStatus, Holding, Side, SkipReason, TradeOutcome,
    ValidatedDecision,
};
use tradeguard_ledger::LedgerHandle;

use crate::services::Services;
use crate::settings::ExecutionSettings;

/// Phases of one batch, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Partitioned,
    SellsExecuting,
    CooldownWait,
    BuysExecuting,
    Persisted,
}

impl std::fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchPhase::Partitioned => "partitioned",
            BatchPhase::SellsExecuting => "sells_executing",
            BatchPhase::CooldownWait => "cooldown_wait",
            BatchPhase::BuysExecuting => "buys_executing",
            BatchPhase::Persisted => "persisted",
        };
        write!(f, "{}", s)
    }
}

/// What the sequencer did with a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub account: String,
    /// One record per decision, sells first, then holds, then buys
    pub records: Vec<ExecutionRecord>,
    pub outcomes: Vec<TradeOutcome>,
    /// Phases entered, in order
    pub phases: Vec<BatchPhase>,
    pub starting_cash: Decimal,
    pub final_cash: Decimal,
    pub sell_proceeds: Decimal,
    pub buy_spend: Decimal,
}

impl ExecutionReport {
    fn new(account: &str, cash: Decimal) -> Self {
        Self {
            account: account.to_string(),
            records: Vec::new(),
            outcomes: Vec::new(),
            phases: Vec::new(),
            starting_cash: cash,
            final_cash: cash,
            sell_proceeds: Decimal::ZERO,
            buy_spend: Decimal::ZERO,
        }
    }

    pub fn executed(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records.iter().filter(|r| r.is_executed())
    }

    pub fn deferred(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.status, ExecutionStatus::Deferred { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.status, ExecutionStatus::Skipped { .. }))
    }

    /// The record for `ticker`, if the batch touched it.
    pub fn record_for(&self, ticker: &str) -> Option<&ExecutionRecord> {
        self.records.iter().find(|r| r.ticker == ticker)
    }
}

/// Result of one leg before it is journaled.
enum Leg {
    Executed {
        shares: Decimal,
        price: Decimal,
        amount: Decimal,
        order_id: Option<String>,
        persist_error: Option<String>,
    },
    Deferred(SkipReason),
    Skipped(SkipReason),
}

impl Leg {
    fn into_status(self) -> ExecutionStatus {
        match self {
            Leg::Executed {
                shares,
                price,
                amount,
                order_id,
                persist_error,
            } => ExecutionStatus::Executed {
                shares,
                price,
                amount,
                order_id,
                persist_error,
            },
            Leg::Deferred(reason) => ExecutionStatus::Deferred { reason },
            Leg::Skipped(reason) => ExecutionStatus::Skipped { reason },
        }
    }
}

/// Executes approved decisions for one account.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSequencer {
    settings: ExecutionSettings,
}

impl ExecutionSequencer {
    pub fn new(settings: ExecutionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Run the batch. Never fails: every problem becomes a recorded skip.
    pub async fn execute(
        &self,
        services: &Services,
        ledger: &LedgerHandle,
        account: &str,
        decisions: Vec<ValidatedDecision>,
    ) -> ExecutionReport {
        let cash = match services.holdings.cash(account).await {
            Ok(cash) => cash,
            Err(e) => {
                error!(account, error = %e, "could not read cash, buys will skip");
                Decimal::ZERO
            }
        };
        let mut report = ExecutionReport::new(account, cash);

        let (mut sells, mut buys, mut holds) = (Vec::new(), Vec::new(), Vec::new());
        for decision in decisions.into_iter().filter(|d| d.accepted) {
            match decision.action {
                Action::Sell => sells.push(decision),
                Action::Buy => buys.push(decision),
                Action::Hold => holds.push(decision),
            }
        }
        self.enter(&mut report, BatchPhase::Partitioned);
        info!(
            account,
            sells = sells.len(),
            buys = buys.len(),
            holds = holds.len(),
            cash = %cash,
            "batch partitioned"
        );

        let mut cash = cash;
        let mut sold_any = false;
        if !sells.is_empty() {
            self.enter(&mut report, BatchPhase::SellsExecuting);
            for decision in &sells {
                let leg = self.sell(services, account, decision, &mut report).await;
                if let Leg::Executed { amount, .. } = &leg {
                    sold_any = true;
                    report.sell_proceeds += *amount;
                }
                self.record(services, account, decision, leg, &mut report).await;
            }

            if report.sell_proceeds > Decimal::ZERO {
                cash += report.sell_proceeds;
                self.persist_cash(services, account, cash).await;
                ledger.apply_fill(Side::Sell, report.sell_proceeds, Decimal::ZERO);
            }
        }

        for decision in &holds {
            debug!(account, ticker = %decision.ticker(), "hold, no action");
            let record = self.journal_row(account, decision, ExecutionStatus::Held);
            self.write_record(services, record, &mut report).await;
        }

        if sold_any && !buys.is_empty() && !self.settings.cooldown().is_zero() {
            self.enter(&mut report, BatchPhase::CooldownWait);
            tokio::time::sleep(self.settings.cooldown()).await;
        }

        if !buys.is_empty() {
            self.enter(&mut report, BatchPhase::BuysExecuting);
            for decision in &buys {
                let leg = self.buy(services, account, decision, cash).await;
                if let Leg::Executed { amount, .. } = &leg {
                    cash -= *amount;
                    report.buy_spend += *amount;
                }
                self.record(services, account, decision, leg, &mut report).await;
            }

            if report.buy_spend > Decimal::ZERO {
                self.persist_cash(services, account, cash).await;
                ledger.apply_fill(Side::Buy, report.buy_spend, Decimal::ZERO);
            }
        }

        report.final_cash = cash;
        self.enter(&mut report, BatchPhase::Persisted);
        info!(
            account,
            executed = report.executed().count(),
            deferred = report.deferred().count(),
            skipped = report.skipped().count(),
            final_cash = %cash,
            "batch executed"
        );
        report
    }

    fn enter(&self, report: &mut ExecutionReport, phase: BatchPhase) {
        debug!(account = %report.account, %phase, "entering phase");
        report.phases.push(phase);
    }

    async fn sell(
        &self,
        services: &Services,
        account: &str,
        decision: &ValidatedDecision,
        report: &mut ExecutionReport,
    ) -> Leg {
        let ticker = decision.ticker();
        let holding = match services.holdings.holding(account, ticker).await {
            Ok(Some(holding)) => holding,
            Ok(None) => return Leg::Skipped(SkipReason::NoHolding),
            Err(e) => return store_failure(&e),
        };
        if !holding.active {
            return Leg::Skipped(SkipReason::AlreadyClosed);
        }
        if holding.shares <= Decimal::ZERO {
            return Leg::Skipped(SkipReason::NoShares);
        }

        if let Err(reason) = self.check_market(services).await {
            return Leg::Deferred(reason);
        }
        let price = match self.fetch_price(services, ticker).await {
            Ok(price) => price,
            Err(leg) => return leg,
        };

        let shares = holding.shares;
        let order_id = match self.place_order(services, account, ticker, shares, Side::Sell).await {
            Ok(order_id) => order_id,
            Err(reason) => return Leg::Skipped(reason),
        };

        let now = Utc::now();
        let outcome = TradeOutcome::from_exit(&holding, price, decision.reason.clone(), now);
        let mut closed = holding;
        let proceeds = closed.close(price);
        let persist_error = match services.holdings.upsert_holding(account, &closed).await {
            Ok(()) => None,
            Err(e) => match &order_id {
                Some(order_id) => {
                    error!(account, ticker, error = %e, %order_id, "sell filled at broker but holding not closed, local holdings out of sync");
                    Some(e.to_string())
                }
                None => {
                    error!(account, ticker, error = %e, "failed to close holding");
                    return store_failure(&e);
                }
            },
        };

        if let Err(e) = services.journal.record_outcome(account, &outcome).await {
            error!(account, ticker, error = %e, "failed to record trade outcome");
        }
        info!(
            account,
            ticker,
            shares = %shares,
            price = %price,
            proceeds = %proceeds,
            realized_pl = %outcome.realized_pl,
            category = %outcome.outcome_category,
            "sold position"
        );
        report.outcomes.push(outcome);

        Leg::Executed {
            shares,
            price,
            amount: proceeds,
            order_id,
            persist_error,
        }
    }

    async fn buy(
        &self,
        services: &Services,
        account: &str,
        decision: &ValidatedDecision,
        cash: Decimal,
    ) -> Leg {
        let ticker = decision.ticker();
        let amount = decision.amount_usd;

        if let Err(reason) = self.check_market(services).await {
            return Leg::Deferred(reason);
        }
        let price = match self.fetch_price(services, ticker).await {
            Ok(price) => price,
            Err(leg) => return leg,
        };

        let shares = (amount / price).floor();
        if shares <= Decimal::ZERO {
            return Leg::Skipped(SkipReason::BelowOneShare {
                price,
                allocated: amount,
            });
        }
        let cost = shares * price;
        let buffer = self.settings.min_cash_buffer;
        if cash - cost < buffer {
            return Leg::Skipped(SkipReason::BufferBreach {
                cost,
                available: cash,
                buffer,
            });
        }

        let existing = match services.holdings.holding(account, ticker).await {
            Ok(existing) => existing,
            Err(e) => return store_failure(&e),
        };

        let order_id = match self.place_order(services, account, ticker, shares, Side::Buy).await {
            Ok(order_id) => order_id,
            Err(reason) => return Leg::Skipped(reason),
        };

        let now = Utc::now();
        let holding = match existing {
            Some(mut holding) => {
                holding.add_shares(shares, price, cost, &decision.reason, now);
                holding
            }
            None => Holding::open(ticker, shares, price, cost, decision.reason.clone(), now),
        };
        let persist_error = match services.holdings.upsert_holding(account, &holding).await {
            Ok(()) => None,
            Err(e) => match &order_id {
                Some(order_id) => {
                    error!(account, ticker, error = %e, %order_id, "buy filled at broker but holding not written, local holdings out of sync");
                    Some(e.to_string())
                }
                None => {
                    error!(account, ticker, error = %e, "failed to write holding");
                    return store_failure(&e);
                }
            },
        };

        info!(
            account,
            ticker,
            shares = %shares,
            price = %price,
            cost = %cost,
            avg_cost = %holding.avg_cost,
            "bought shares"
        );
        Leg::Executed {
            shares,
            price,
            amount: cost,
            order_id,
            persist_error,
        }
    }

    /// A negative or unavailable clock counts as closed.
    async fn check_market(&self, services: &Services) -> Result<(), SkipReason> {
        match timeout(self.settings.price_timeout(), services.market.is_market_open()).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(SkipReason::MarketClosed),
            Ok(Err(e)) => {
                warn!(error = %e, "market clock unavailable");
                Err(SkipReason::MarketClosed)
            }
            Err(_) => {
                warn!(timeout_ms = self.settings.price_timeout_ms, "market clock timed out");
                Err(SkipReason::MarketClosed)
            }
        }
    }

    /// A fresh positive price, or the leg to record instead.
    ///
    /// Terminal feed errors (unknown symbol, bad configuration) skip the leg;
    /// anything that may clear up by the next cycle defers it.
    async fn fetch_price(&self, services: &Services, ticker: &str) -> Result<Decimal, Leg> {
        let (detail, retryable) = match timeout(
            self.settings.price_timeout(),
            services.market.get_last_price(ticker),
        )
        .await
        {
            Ok(Ok(Some(price))) if price > Decimal::ZERO => return Ok(price),
            Ok(Ok(Some(price))) => (format!("invalid price {}", price), true),
            Ok(Ok(None)) => ("no quote".to_string(), true),
            Ok(Err(e)) => (e.to_string(), e.is_transient()),
            Err(_) => (
                format!("timed out after {} ms", self.settings.price_timeout_ms),
                true,
            ),
        };
        warn!(ticker, %detail, retryable, "price unavailable");
        let reason = SkipReason::PriceUnavailable { detail };
        Err(if retryable {
            Leg::Deferred(reason)
        } else {
            Leg::Skipped(reason)
        })
    }

    /// Place the order when live; mirror-only runs return no order id.
    async fn place_order(
        &self,
        services: &Services,
        account: &str,
        ticker: &str,
        shares: Decimal,
        side: Side,
    ) -> Result<Option<String>, SkipReason> {
        if !self.settings.live_orders {
            return Ok(None);
        }

        let detail = match timeout(
            self.settings.broker_timeout(),
            services.broker_for(account).place_order(ticker, shares, side),
        )
        .await
        {
            Ok(Ok(ack)) if ack.is_accepted() => {
                debug!(ticker, order_id = %ack.order_id, status = ?ack.status, "order accepted");
                return Ok(Some(ack.order_id));
            }
            Ok(Ok(ack)) => format!("order {} ended {:?}", ack.order_id, ack.status),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {} ms", self.settings.broker_timeout_ms),
        };
        warn!(ticker, ?side, %detail, "order placement failed");
        Err(SkipReason::OrderFailed { detail })
    }

    async fn persist_cash(&self, services: &Services, account: &str, cash: Decimal) {
        if let Err(e) = services.holdings.set_cash(account, cash).await {
            error!(account, cash = %cash, error = %e, "failed to persist cash");
        }
    }

    fn journal_row(
        &self,
        account: &str,
        decision: &ValidatedDecision,
        status: ExecutionStatus,
    ) -> ExecutionRecord {
        ExecutionRecord {
            account: account.to_string(),
            action: decision.action,
            ticker: decision.ticker().to_string(),
            amount_usd: decision.amount_usd,
            proposal_reason: decision.reason.clone(),
            status,
            recorded_at: Utc::now(),
        }
    }

    async fn record(
        &self,
        services: &Services,
        account: &str,
        decision: &ValidatedDecision,
        leg: Leg,
        report: &mut ExecutionReport,
    ) {
        match &leg {
            Leg::Deferred(reason) => {
                warn!(account, action = %decision.action, ticker = %decision.ticker(), %reason, "deferred")
            }
            Leg::Skipped(reason) => {
                warn!(account, action = %decision.action, ticker = %decision.ticker(), %reason, "skipped")
            }
            Leg::Executed { .. } => {}
        }
        let record = self.journal_row(account, decision, leg.into_status());
        self.write_record(services, record, report).await;
    }

    async fn write_record(
        &self,
        services: &Services,
        record: ExecutionRecord,
        report: &mut ExecutionReport,
    ) {
        if let Err(e) = services.journal.record_execution(&record).await {
            error!(account = %record.account, ticker = %record.ticker, error = %e, "failed to journal execution");
        }
        report.records.push(record);
    }
}

/// A store failure that may clear up defers the leg; anything else skips it.
fn store_failure(e: &StoreError) -> Leg {
    let reason = SkipReason::PersistenceFailed {
        detail: e.to_string(),
    };
    if e.is_transient() {
        Leg::Deferred(reason)
    } else {
        Leg::Skipped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(BatchPhase::CooldownWait.to_string(), "cooldown_wait");
        let json = serde_json::to_string(&BatchPhase::BuysExecuting).unwrap();
        assert_eq!(json, "\"buys_executing\"");
    }
}
