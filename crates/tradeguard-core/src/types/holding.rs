//! Holding and portfolio snapshot types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A locally mirrored position in a single security.
///
/// Holdings are never deleted: a full exit leaves an inactive row with zero
/// shares so the audit trail and outcome feedback keep their history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Ticker symbol
    pub ticker: String,
    /// Number of whole shares held (never negative)
    pub shares: Decimal,
    /// Average cost per share
    pub avg_cost: Decimal,
    /// Last known market price
    pub current_price: Decimal,
    /// Total cash spent on the shares currently held
    pub total_cost_basis: Decimal,
    /// shares * current_price
    pub current_value: Decimal,
    /// current_value - total_cost_basis
    pub unrealized_pl: Decimal,
    /// False once the position has been fully exited
    pub active: bool,
    /// When the current position was opened
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
    /// Proposer's stated reason(s) for entering
    #[serde(default)]
    pub entry_reason: String,
}

impl Holding {
    /// Open a fresh position.
    pub fn open(
        ticker: impl Into<String>,
        shares: Decimal,
        price: Decimal,
        cost: Decimal,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut holding = Self {
            ticker: ticker.into(),
            shares,
            avg_cost: price,
            current_price: price,
            total_cost_basis: cost,
            current_value: Decimal::ZERO,
            unrealized_pl: Decimal::ZERO,
            active: true,
            opened_at: Some(at),
            entry_reason: reason.into(),
        };
        if shares > Decimal::ZERO {
            holding.avg_cost = cost / shares;
        }
        holding.mark(price);
        holding
    }

    /// Add a buy fill to this holding.
    ///
    /// An active holding has its cost basis re-averaged; an inactive one is
    /// reactivated as a brand-new position.
    pub fn add_shares(
        &mut self,
        shares: Decimal,
        price: Decimal,
        cost: Decimal,
        reason: &str,
        at: DateTime<Utc>,
    ) {
        if !self.active || self.shares <= Decimal::ZERO {
            *self = Holding::open(self.ticker.clone(), shares, price, cost, reason, at);
            return;
        }

        let new_shares = self.shares + shares;
        let new_basis = self.total_cost_basis + cost;

        self.shares = new_shares;
        self.total_cost_basis = new_basis;
        self.avg_cost = new_basis / new_shares;
        self.opened_at = Some(at);
        if self.entry_reason.is_empty() {
            self.entry_reason = reason.to_string();
        } else if !reason.is_empty() {
            self.entry_reason = format!("{} + {}", self.entry_reason, reason);
        }
        self.mark(price);
    }

    /// Update the market price and recalculate derived values.
    pub fn mark(&mut self, price: Decimal) {
        self.current_price = price;
        self.current_value = self.shares * price;
        self.unrealized_pl = self.current_value - self.total_cost_basis;
    }

    /// Fully exit at `price`, returning the proceeds.
    ///
    /// `avg_cost` is kept so the row still tells what the position cost.
    pub fn close(&mut self, price: Decimal) -> Decimal {
        let proceeds = self.shares * price;
        self.shares = Decimal::ZERO;
        self.current_price = price;
        self.current_value = Decimal::ZERO;
        self.total_cost_basis = Decimal::ZERO;
        self.unrealized_pl = Decimal::ZERO;
        self.active = false;
        proceeds
    }

    /// Whether this row currently represents shares we own.
    pub fn is_open(&self) -> bool {
        self.active && self.shares > Decimal::ZERO
    }

    /// Market value counted toward the portfolio (zero when inactive).
    pub fn market_value(&self) -> Decimal {
        if self.active {
            self.current_value
        } else {
            Decimal::ZERO
        }
    }

    /// Unrealized P&L as a fraction of cost basis.
    pub fn unrealized_pl_ratio(&self) -> Decimal {
        if self.total_cost_basis == Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.unrealized_pl / self.total_cost_basis
    }
}

/// Holdings plus cash as read from the holdings store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Cash balance
    pub cash: Decimal,
    /// Every holding row, active or not
    pub holdings: Vec<Holding>,
}

impl PortfolioSnapshot {
    pub fn new(cash: Decimal, holdings: Vec<Holding>) -> Self {
        Self { cash, holdings }
    }

    /// Active holdings with shares.
    pub fn open_holdings(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.iter().filter(|h| h.is_open())
    }

    /// Tickers of the open holdings.
    pub fn held_tickers(&self) -> BTreeSet<String> {
        self.open_holdings().map(|h| h.ticker.clone()).collect()
    }

    /// Find a holding row by ticker (active or not).
    pub fn get(&self, ticker: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.ticker == ticker)
    }

    /// Market value of all active holdings.
    pub fn invested_value(&self) -> Decimal {
        self.holdings.iter().map(Holding::market_value).sum()
    }

    /// Active holdings plus cash.
    pub fn total_value(&self) -> Decimal {
        self.invested_value() + self.cash
    }

    /// Number of open positions.
    pub fn position_count(&self) -> usize {
        self.open_holdings().count()
    }
}
