//! Realized outcomes of closed positions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::Holding;

/// Gain at or above this fraction is a significant profit.
pub const SIGNIFICANT_PROFIT_THRESHOLD: Decimal = dec!(0.05);
/// Loss down to this fraction is still break-even.
pub const BREAK_EVEN_FLOOR: Decimal = dec!(-0.02);
/// Loss below this fraction is a significant loss.
pub const SIGNIFICANT_LOSS_THRESHOLD: Decimal = dec!(-0.10);

/// Coarse classification fed back to the proposer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    SignificantProfit,
    ModerateProfit,
    BreakEven,
    ModerateLoss,
    SignificantLoss,
}

impl OutcomeCategory {
    /// Classify a realized P&L ratio (0.05 == +5%).
    pub fn classify(pl_ratio: Decimal) -> Self {
        if pl_ratio >= SIGNIFICANT_PROFIT_THRESHOLD {
            OutcomeCategory::SignificantProfit
        } else if pl_ratio > Decimal::ZERO {
            OutcomeCategory::ModerateProfit
        } else if pl_ratio >= BREAK_EVEN_FLOOR {
            OutcomeCategory::BreakEven
        } else if pl_ratio >= SIGNIFICANT_LOSS_THRESHOLD {
            OutcomeCategory::ModerateLoss
        } else {
            OutcomeCategory::SignificantLoss
        }
    }
}

impl std::fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutcomeCategory::SignificantProfit => "significant_profit",
            OutcomeCategory::ModerateProfit => "moderate_profit",
            OutcomeCategory::BreakEven => "break_even",
            OutcomeCategory::ModerateLoss => "moderate_loss",
            OutcomeCategory::SignificantLoss => "significant_loss",
        };
        write!(f, "{}", s)
    }
}

/// The realized result of closing a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub ticker: String,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub shares: Decimal,
    pub realized_pl: Decimal,
    /// Realized P&L as a percentage of the entry price
    pub realized_pl_pct: Decimal,
    /// Whole days between opening and closing
    pub hold_duration_days: i64,
    pub outcome_category: OutcomeCategory,
    pub entry_reason: String,
    pub exit_reason: String,
    pub closed_at: DateTime<Utc>,
}

impl TradeOutcome {
    /// Compute the outcome of exiting `holding` (still open) at `exit_price`.
    pub fn from_exit(
        holding: &Holding,
        exit_price: Decimal,
        exit_reason: impl Into<String>,
        closed_at: DateTime<Utc>,
    ) -> Self {
        let entry_price = holding.avg_cost;
        let realized_pl = (exit_price - entry_price) * holding.shares;
        let ratio = if entry_price > Decimal::ZERO {
            (exit_price - entry_price) / entry_price
        } else {
            Decimal::ZERO
        };
        let hold_duration_days = holding
            .opened_at
            .map(|opened| (closed_at - opened).num_days().max(0))
            .unwrap_or(0);

        Self {
            ticker: holding.ticker.clone(),
            entry_price,
            exit_price,
            shares: holding.shares,
            realized_pl,
            realized_pl_pct: (ratio * dec!(100)).round_dp(4),
            hold_duration_days,
            outcome_category: OutcomeCategory::classify(ratio),
            entry_reason: holding.entry_reason.clone(),
            exit_reason: exit_reason.into(),
            closed_at,
        }
    }
}
