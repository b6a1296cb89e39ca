//! The shadow ledger itself.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};
use tradeguard_core::types::{Balances, FillEvent, OpenOrder, SettlementMode, Side, Transaction};

use crate::reconcile::{IntradayFigures, ReconcileReport};
use crate::snapshot::LedgerSnapshot;

/// Ledger errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Broker truth could not be fetched since the last seed
    #[error("funds figure is stale: broker balances unavailable since {last_refresh:?}")]
    Stale { last_refresh: Option<DateTime<Utc>> },
}

/// Raw ledger figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundsLedgerState {
    /// Broker cash baseline
    pub settled_cash: Decimal,
    /// Same-day sale proceeds not yet settled
    pub unsettled_sell_proceeds: Decimal,
    /// Same-day purchase debits not yet settled
    pub unsettled_buy_debits: Decimal,
    /// Cash held by working buy orders
    pub open_order_reserve: Decimal,
    /// Commissions and fees accrued today
    pub fee_reserve: Decimal,
    /// When the baseline was last seeded from the broker
    pub last_refresh: Option<DateTime<Utc>>,
}

impl FundsLedgerState {
    pub(crate) fn intraday(&self) -> IntradayFigures {
        IntradayFigures {
            unsettled_sell_proceeds: self.unsettled_sell_proceeds,
            unsettled_buy_debits: self.unsettled_buy_debits,
            open_order_reserve: self.open_order_reserve,
            fee_reserve: self.fee_reserve,
        }
    }

    fn set_intraday(&mut self, figures: IntradayFigures) {
        self.unsettled_sell_proceeds = figures.unsettled_sell_proceeds;
        self.unsettled_buy_debits = figures.unsettled_buy_debits;
        self.open_order_reserve = figures.open_order_reserve;
        self.fee_reserve = figures.fee_reserve;
    }
}

/// Shadow ledger of broker funds.
///
/// Reconciliation is authoritative: it replaces the intraday figures rather
/// than merging with fills applied since, and remembers which transactions it
/// covered so a late duplicate fill cannot be counted twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundsLedger {
    state: FundsLedgerState,
    /// Latest transaction time covered by the last reconciliation
    watermark: Option<DateTime<Utc>>,
    /// Transaction ids covered by the last reconciliation
    reconciled_ids: BTreeSet<String>,
    /// Set when a broker fetch failed after the last seed
    stale: bool,
}

impl FundsLedger {
    /// Create an empty, never-seeded ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the settled baseline from broker balances.
    pub fn seed(&mut self, balances: &Balances) {
        self.seed_at(balances, Utc::now());
    }

    /// Seed with an explicit refresh time.
    pub fn seed_at(&mut self, balances: &Balances, at: DateTime<Utc>) {
        self.state.settled_cash = balances.total_cash.max(Decimal::ZERO);
        self.state.last_refresh = Some(at);
        self.stale = false;
        debug!(settled_cash = %self.state.settled_cash, "ledger seeded");
    }

    /// Rebuild the intraday figures from broker truth.
    ///
    /// Idempotent: identical inputs produce identical ledger state.
    pub fn reconcile(
        &mut self,
        open_orders: &[OpenOrder],
        todays_transactions: &[Transaction],
    ) -> ReconcileReport {
        let previous = self.state.intraday();
        let reconciled = IntradayFigures::from_broker(open_orders, todays_transactions);

        self.state.set_intraday(reconciled);
        self.watermark = todays_transactions.iter().map(|tx| tx.occurred_at).max();
        self.reconciled_ids = todays_transactions.iter().map(|tx| tx.id.clone()).collect();

        let report = ReconcileReport {
            previous,
            reconciled,
            open_orders: open_orders.len(),
            trades: todays_transactions.len(),
        };

        if report.has_conflict() {
            let delta = report.discrepancy();
            warn!(
                sells_delta = %delta.unsettled_sell_proceeds,
                buys_delta = %delta.unsettled_buy_debits,
                reserve_delta = %delta.open_order_reserve,
                fees_delta = %delta.fee_reserve,
                "broker truth disagrees with shadow ledger; broker figures replace the estimate"
            );
        } else {
            info!(
                open_orders = report.open_orders,
                transactions = report.trades,
                "ledger reconciled"
            );
        }
        report
    }

    /// Register a single fill between reconciliations.
    pub fn apply_fill(&mut self, side: Side, amount: Decimal, fees: Decimal) {
        let mut figures = self.state.intraday();
        figures.add_fill(side, amount, fees);
        self.state.set_intraday(figures);
    }

    /// Register a streamed fill unless reconciliation already covered it.
    ///
    /// Returns whether the event changed the ledger.
    pub fn apply_fill_event(&mut self, event: &FillEvent) -> bool {
        if self.reconciled_ids.contains(&event.id) {
            debug!(fill_id = %event.id, "fill already reconciled, ignoring");
            return false;
        }
        if matches!(self.watermark, Some(mark) if event.occurred_at <= mark) {
            debug!(fill_id = %event.id, "fill predates reconciliation watermark, ignoring");
            return false;
        }
        self.apply_fill(event.side, event.amount, event.fees);
        true
    }

    /// Funds safely available for new orders.
    ///
    /// `settled - open_order_reserve - fee_reserve`, then either plus the net
    /// same-day proceeds (when unsettled cash may be used) or minus the
    /// unsettled buy debits. Rounded to cents and never negative.
    pub fn effective_funds(&self, allow_unsettled: bool) -> Decimal {
        let s = &self.state;
        let mut funds = s.settled_cash - s.open_order_reserve - s.fee_reserve;
        if allow_unsettled {
            funds += (s.unsettled_sell_proceeds - s.unsettled_buy_debits).max(Decimal::ZERO);
        } else {
            funds -= s.unsettled_buy_debits.max(Decimal::ZERO);
        }
        funds.round_dp(2).max(Decimal::ZERO)
    }

    /// `effective_funds` for an account's settlement mode.
    pub fn effective_funds_for(&self, mode: SettlementMode) -> Decimal {
        self.effective_funds(mode.allow_unsettled())
    }

    /// Effective funds, refusing to answer when broker truth is missing.
    pub fn fresh_effective_funds(&self, mode: SettlementMode) -> Result<Decimal, LedgerError> {
        if self.is_stale() {
            return Err(LedgerError::Stale {
                last_refresh: self.state.last_refresh,
            });
        }
        Ok(self.effective_funds_for(mode))
    }

    /// Record that broker truth could not be fetched.
    pub fn mark_stale(&mut self) {
        if !self.stale {
            warn!(last_refresh = ?self.state.last_refresh, "ledger marked stale");
        }
        self.stale = true;
    }

    /// Stale when never seeded or when a fetch failed after the last seed.
    pub fn is_stale(&self) -> bool {
        self.stale || self.state.last_refresh.is_none()
    }

    /// Full reset, including the settled baseline.
    pub fn reset(&mut self) {
        *self = FundsLedger::default();
    }

    pub fn state(&self) -> &FundsLedgerState {
        &self.state
    }

    /// Diagnostics view.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::from_ledger(self)
    }
}
