//! Results of risk checks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A portfolio-level block.
///
/// Distinct from a validation rejection: a violation points at a systemic or
/// configuration risk rather than a bad proposal.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SafetyViolation {
    #[error("invalid trade amount ${amount:.2}")]
    InvalidAmount { amount: Decimal },

    #[error("trade value ${amount:.2} below minimum ${min:.2}")]
    BelowMinimumTrade { amount: Decimal, min: Decimal },

    #[error("no capacity available for additional buying")]
    NoCapacity,

    #[error(
        "trade would exceed limits; remaining capacity ${capacity:.2} is below minimum ${min:.2}"
    )]
    CapacityBelowMinimum { capacity: Decimal, min: Decimal },

    #[error("max positions reached: {count} (limit: {max})")]
    MaxPositionsReached { count: usize, max: usize },

    #[error("no position found for {ticker}")]
    NoPosition { ticker: String },

    #[error("no value in position for {ticker}")]
    EmptyPosition { ticker: String },

    #[error("daily trade limit exceeded ({count} of {max} trades today)")]
    DailyTradeLimit { count: u32, max: u32 },

    /// The trade counter could not be read; trading is blocked for caution
    #[error("daily trade count unavailable ({detail}); blocking for safety")]
    TradeCountUnavailable { detail: String },

    #[error("portfolio unhealthy, buys halted: {}", .warnings.join("; "))]
    KillSwitch { warnings: Vec<String> },
}

/// Why a sell is worth taking regardless of the proposer's reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitSignal {
    /// Unrealized gain at or past the take-profit threshold
    TakeProfit { gain_pct: Decimal },
    /// Unrealized loss at or past the stop-loss threshold
    StopLoss { loss_pct: Decimal },
}

impl std::fmt::Display for ExitSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitSignal::TakeProfit { gain_pct } => {
                write!(f, "harvest gains: position up {:.2}%", gain_pct)
            }
            ExitSignal::StopLoss { loss_pct } => {
                write!(f, "stop loss: position down {:.2}%", loss_pct)
            }
        }
    }
}

/// Result of a limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitCheck {
    /// Trade allowed as requested
    Allowed { exit_signal: Option<ExitSignal> },
    /// Buy allowed at a smaller amount
    Reduced { amount: Decimal, requested: Decimal },
    /// Trade blocked
    Blocked(SafetyViolation),
}

impl LimitCheck {
    pub fn allowed() -> Self {
        LimitCheck::Allowed { exit_signal: None }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitCheck::Allowed { .. } | LimitCheck::Reduced { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, LimitCheck::Blocked(_))
    }

    pub fn violation(&self) -> Option<&SafetyViolation> {
        match self {
            LimitCheck::Blocked(violation) => Some(violation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_daily_limit_text() {
        let violation = SafetyViolation::DailyTradeLimit { count: 10, max: 10 };
        assert!(violation.to_string().starts_with("daily trade limit exceeded"));
    }

    #[test]
    fn test_limit_check_predicates() {
        assert!(LimitCheck::allowed().is_allowed());
        let reduced = LimitCheck::Reduced {
            amount: dec!(500),
            requested: dec!(1500),
        };
        assert!(reduced.is_allowed());
        assert!(reduced.violation().is_none());

        let blocked = LimitCheck::Blocked(SafetyViolation::NoCapacity);
        assert!(blocked.is_blocked());
        assert_eq!(blocked.violation(), Some(&SafetyViolation::NoCapacity));
    }

    #[test]
    fn test_kill_switch_text_joins_warnings() {
        let violation = SafetyViolation::KillSwitch {
            warnings: vec!["loss too deep".to_string(), "cash low".to_string()],
        };
        assert_eq!(
            violation.to_string(),
            "portfolio unhealthy, buys halted: loss too deep; cash low"
        );
    }
}
