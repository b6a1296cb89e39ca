//! Records written to the trade journal for every decision the sequencer sees.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Action;

/// Why a decision was not executed.
///
/// Each variant is machine-distinguishable; `Display` gives the
/// human-readable text stored alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SkipReason {
    /// No fresh price could be fetched in time
    PriceUnavailable { detail: String },
    /// The market-open signal was negative or unavailable
    MarketClosed,
    /// No holding row exists for the ticker
    NoHolding,
    /// The holding exists but was already sold
    AlreadyClosed,
    /// The holding is active but holds no shares
    NoShares,
    /// The allocation does not cover a single share
    BelowOneShare { price: Decimal, allocated: Decimal },
    /// Cash after the buy would drop under the minimum buffer
    BufferBreach {
        cost: Decimal,
        available: Decimal,
        buffer: Decimal,
    },
    /// The broker did not accept the order
    OrderFailed { detail: String },
    /// The holdings store rejected the write
    PersistenceFailed { detail: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::PriceUnavailable { detail } => {
                write!(f, "price data unavailable ({})", detail)
            }
            SkipReason::MarketClosed => write!(f, "market closed - no action taken"),
            SkipReason::NoHolding => write!(f, "no holding found to sell"),
            SkipReason::AlreadyClosed => write!(f, "already sold - position is inactive"),
            SkipReason::NoShares => write!(f, "no shares to sell"),
            SkipReason::BelowOneShare { price, allocated } => write!(
                f,
                "insufficient funds for 1 share (need ${:.2}, allocated ${:.2})",
                price, allocated
            ),
            SkipReason::BufferBreach { cost, available, buffer } => write!(
                f,
                "budget exceeded: ${:.2} from ${:.2} would breach the ${:.2} cash buffer",
                cost, available, buffer
            ),
            SkipReason::OrderFailed { detail } => write!(f, "order placement failed: {}", detail),
            SkipReason::PersistenceFailed { detail } => {
                write!(f, "holdings update failed: {}", detail)
            }
        }
    }
}

/// What happened to a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Executed {
        shares: Decimal,
        price: Decimal,
        amount: Decimal,
        #[serde(default)]
        order_id: Option<String>,
        /// Set when the broker filled the order but the local holding write failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        persist_error: Option<String>,
    },
    /// Not executed now, eligible again next cycle
    Deferred { reason: SkipReason },
    /// Not executed, will not be retried as-is
    Skipped { reason: SkipReason },
    /// Hold decisions need no action
    Held,
}

/// One journal row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub account: String,
    pub action: Action,
    pub ticker: String,
    pub amount_usd: Decimal,
    /// The proposer's reason
    pub proposal_reason: String,
    pub status: ExecutionStatus,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn is_executed(&self) -> bool {
        matches!(self.status, ExecutionStatus::Executed { .. })
    }

    /// Skip or defer reason, if any.
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.status {
            ExecutionStatus::Deferred { reason } | ExecutionStatus::Skipped { reason } => {
                Some(reason)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_skip_reason_text() {
        let reason = SkipReason::BelowOneShare {
            price: dec!(800),
            allocated: dec!(500),
        };
        assert_eq!(
            reason.to_string(),
            "insufficient funds for 1 share (need $800.00, allocated $500.00)"
        );
    }

    #[test]
    fn test_status_serializes_with_codes() {
        let status = ExecutionStatus::Deferred {
            reason: SkipReason::MarketClosed,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "deferred");
        assert_eq!(json["reason"]["code"], "market_closed");
    }
}
