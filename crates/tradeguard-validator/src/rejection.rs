//! Why a proposal was turned away.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradeguard_core::types::TradeProposal;

/// Whether the proposer produced garbage or a readable but invalid intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Could not be read as a proposal at all
    Malformed,
    /// Readable, but breaks a business rule
    Rule,
}

fn holdings_list(holdings: &[String]) -> String {
    if holdings.is_empty() {
        "NONE".to_string()
    } else {
        holdings.join(", ")
    }
}

/// A validation rejection.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("malformed record: {detail}")]
    Malformed { detail: String },

    #[error("missing '{field}' field")]
    MissingField { field: String },

    #[error("invalid action '{action}' (must be buy/sell/hold)")]
    InvalidAction { action: String },

    #[error("invalid ticker format: '{ticker}'")]
    InvalidTicker { ticker: String },

    /// SELL of a ticker that is not held
    #[error(
        "hallucination: cannot sell {ticker}, not currently held (holdings: {})",
        holdings_list(.holdings)
    )]
    SellNotHeld { ticker: String, holdings: Vec<String> },

    /// HOLD of a ticker that is not held
    #[error(
        "hallucination: cannot hold {ticker}, not currently held (holdings: {})",
        holdings_list(.holdings)
    )]
    HoldNotHeld { ticker: String, holdings: Vec<String> },

    #[error("cannot buy {ticker}: already own it, must sell first")]
    AlreadyHeld { ticker: String },

    #[error("missing or invalid amount_usd")]
    InvalidAmount,

    #[error("buy amount ${amount:.2} too small (minimum ${min:.2})")]
    BelowMinimum { amount: Decimal, min: Decimal },

    #[error("buy amount ${amount:.2} too large (maximum ${max:.2})")]
    AboveMaximum { amount: Decimal, max: Decimal },

    #[error("buy amount ${amount:.2} exceeds available cash ${available:.2}")]
    ExceedsAvailableCash { amount: Decimal, available: Decimal },

    #[error("funds unavailable: broker balances are stale, no new buys")]
    FundsUnavailable,
}

impl RejectionReason {
    pub fn kind(&self) -> RejectionKind {
        match self {
            RejectionReason::Malformed { .. } => RejectionKind::Malformed,
            _ => RejectionKind::Rule,
        }
    }

    /// The proposal referenced a position that does not exist.
    pub fn is_hallucination(&self) -> bool {
        matches!(
            self,
            RejectionReason::SellNotHeld { .. } | RejectionReason::HoldNotHeld { .. }
        )
    }
}

/// A rejected record with its position in the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedProposal {
    /// Zero-based index in the batch
    pub index: usize,
    /// The decoded proposal; `None` for malformed records
    pub proposal: Option<TradeProposal>,
    /// Normalized ticker, when one could be read
    pub normalized_ticker: Option<String>,
    pub reason: RejectionReason,
}
