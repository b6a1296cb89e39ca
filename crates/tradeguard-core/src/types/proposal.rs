//! Trade proposals from the untrusted proposer and their validated form.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What the proposer wants done with a ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    /// Case-insensitive parse of `buy` / `sell` / `hold`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Action::Buy),
            "sell" => Some(Action::Sell),
            "hold" => Some(Action::Hold),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// A proposal exactly as decoded from the proposer.
///
/// Every field is optional: the proposer is not trusted to fill them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub amount_usd: Option<Decimal>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl TradeProposal {
    /// Convenience constructor for well-formed proposals.
    pub fn new(action: &str, ticker: &str, amount_usd: Decimal, reason: &str) -> Self {
        Self {
            action: Some(action.to_string()),
            ticker: Some(ticker.to_string()),
            amount_usd: Some(amount_usd),
            reason: Some(reason.to_string()),
        }
    }
}

/// A proposal after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedDecision {
    /// The proposal as received
    pub proposal: TradeProposal,
    pub action: Action,
    /// Ticker after normalization (uppercase bare symbol)
    pub normalized_ticker: String,
    /// Requested dollar amount (zero when the proposer gave none)
    pub amount_usd: Decimal,
    pub reason: String,
    pub accepted: bool,
    pub rejection_reason: Option<String>,
}

impl ValidatedDecision {
    /// Build an accepted decision.
    pub fn accepted(
        proposal: TradeProposal,
        action: Action,
        normalized_ticker: String,
        amount_usd: Decimal,
        reason: String,
    ) -> Self {
        Self {
            proposal,
            action,
            normalized_ticker,
            amount_usd,
            reason,
            accepted: true,
            rejection_reason: None,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.normalized_ticker
    }

    /// Mark this decision rejected by a later layer.
    pub fn reject(mut self, reason: impl Into<String>) -> Self {
        self.accepted = false;
        self.rejection_reason = Some(reason.into());
        self
    }
}
