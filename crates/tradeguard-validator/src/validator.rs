//! Sequential validation of a proposal batch.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};
use tradeguard_core::types::{
    Action, Holding, SettlementMode, TradeProposal, ValidatedDecision,
};

use crate::decode::{decode_batch, DecodedRecord};
use crate::normalize::{is_valid_ticker, normalize_ticker};
use crate::rejection::{RejectedProposal, RejectionReason};

/// Per-ticket bounds on BUY amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyLimits {
    pub min_buy: Decimal,
    pub max_buy: Decimal,
}

impl Default for BuyLimits {
    fn default() -> Self {
        Self {
            min_buy: dec!(1000),
            max_buy: dec!(4000),
        }
    }
}

/// What the validator knows about spendable cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundsView {
    Fresh(Decimal),
    /// Broker truth unavailable: no buys may be accepted
    Stale,
}

/// The running view a batch is validated against.
///
/// Immutable: each accepted proposal produces the next state.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorState {
    held: BTreeSet<String>,
    /// Market value of each held position
    values: BTreeMap<String, Decimal>,
    funds: FundsView,
}

impl ValidatorState {
    /// Seed from the pre-batch holdings and a funds figure.
    pub fn from_holdings(holdings: &[Holding], funds: FundsView) -> Self {
        let mut values = BTreeMap::new();
        for holding in holdings.iter().filter(|h| h.is_open()) {
            let value = if holding.current_value > Decimal::ZERO {
                holding.current_value
            } else {
                holding.current_price * holding.shares
            };
            values.insert(holding.ticker.to_uppercase(), value);
        }
        Self {
            held: values.keys().cloned().collect(),
            values,
            funds,
        }
    }

    pub fn is_held(&self, ticker: &str) -> bool {
        self.held.contains(ticker)
    }

    pub fn held(&self) -> &BTreeSet<String> {
        &self.held
    }

    pub fn funds(&self) -> FundsView {
        self.funds
    }

    fn holdings_list(&self) -> Vec<String> {
        self.held.iter().cloned().collect()
    }

    /// The state after `decision` has been accepted.
    fn apply(&self, decision: &ValidatedDecision, mode: SettlementMode) -> Self {
        let mut next = self.clone();
        let ticker = decision.ticker();
        match decision.action {
            Action::Sell => {
                next.held.remove(ticker);
                let proceeds = next.values.remove(ticker).unwrap_or(Decimal::ZERO);
                if let (FundsView::Fresh(cash), true) = (next.funds, mode.allow_unsettled()) {
                    next.funds = FundsView::Fresh(cash + proceeds);
                }
            }
            Action::Buy => {
                next.held.insert(ticker.to_string());
                next.values.insert(ticker.to_string(), Decimal::ZERO);
                if let FundsView::Fresh(cash) = next.funds {
                    next.funds = FundsView::Fresh(cash - decision.amount_usd);
                }
            }
            Action::Hold => {}
        }
        next
    }
}

/// Result of validating one batch. Always complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Accepted decisions in proposer order
    pub accepted: Vec<ValidatedDecision>,
    pub rejected: Vec<RejectedProposal>,
    /// Held tickers that no proposal mentioned
    pub unreferenced_holdings: Vec<String>,
}

impl ValidationReport {
    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }
}

/// Turns an untrusted batch into accepted and rejected sets.
#[derive(Debug, Clone, Default)]
pub struct ProposalValidator {
    limits: BuyLimits,
    mode: SettlementMode,
}

impl ProposalValidator {
    pub fn new(limits: BuyLimits, mode: SettlementMode) -> Self {
        Self { limits, mode }
    }

    pub fn limits(&self) -> &BuyLimits {
        &self.limits
    }

    pub fn mode(&self) -> SettlementMode {
        self.mode
    }

    /// Decode and validate a raw JSON batch.
    pub fn validate_json(&self, raw: &Value, state: ValidatorState) -> ValidationReport {
        self.validate_records(decode_batch(raw), state)
    }

    /// Validate already-decoded proposals.
    pub fn validate(&self, proposals: &[TradeProposal], state: ValidatorState) -> ValidationReport {
        let records = proposals.iter().cloned().map(DecodedRecord::Proposal).collect();
        self.validate_records(records, state)
    }

    /// Validate decoded records strictly in order.
    pub fn validate_records(
        &self,
        records: Vec<DecodedRecord>,
        initial: ValidatorState,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut referenced = BTreeSet::new();
        let mut state = initial.clone();

        for (index, record) in records.into_iter().enumerate() {
            let proposal = match record {
                DecodedRecord::Proposal(proposal) => proposal,
                DecodedRecord::Malformed { detail } => {
                    let reason = RejectionReason::Malformed { detail };
                    warn!(index, %reason, "proposal rejected");
                    report.rejected.push(RejectedProposal {
                        index,
                        proposal: None,
                        normalized_ticker: None,
                        reason,
                    });
                    continue;
                }
            };

            let normalized = proposal
                .ticker
                .as_deref()
                .map(normalize_ticker)
                .filter(|t| !t.is_empty());
            if let Some(ticker) = &normalized {
                referenced.insert(ticker.clone());
            }

            match self.check(&proposal, normalized.clone(), &state) {
                Ok(decision) => {
                    debug!(
                        index,
                        action = %decision.action,
                        ticker = %decision.ticker(),
                        amount = %decision.amount_usd,
                        "proposal accepted"
                    );
                    state = state.apply(&decision, self.mode);
                    report.accepted.push(decision);
                }
                Err(reason) => {
                    warn!(index, ticker = ?normalized, %reason, "proposal rejected");
                    report.rejected.push(RejectedProposal {
                        index,
                        proposal: Some(proposal),
                        normalized_ticker: normalized,
                        reason,
                    });
                }
            }
        }

        report.unreferenced_holdings = initial
            .held()
            .iter()
            .filter(|t| !referenced.contains(*t))
            .cloned()
            .collect();
        if !report.unreferenced_holdings.is_empty() {
            warn!(
                tickers = ?report.unreferenced_holdings,
                "proposer gave no decision for held positions"
            );
        }

        info!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "validation complete"
        );
        report
    }

    /// Check one proposal against the running state.
    fn check(
        &self,
        proposal: &TradeProposal,
        normalized: Option<String>,
        state: &ValidatorState,
    ) -> Result<ValidatedDecision, RejectionReason> {
        let raw_action = proposal
            .action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| missing("action"))?;
        let ticker = normalized.ok_or_else(|| missing("ticker"))?;
        let reason = proposal
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| missing("reason"))?;

        let action = Action::parse(raw_action).ok_or_else(|| RejectionReason::InvalidAction {
            action: raw_action.to_lowercase(),
        })?;
        if !is_valid_ticker(&ticker) {
            return Err(RejectionReason::InvalidTicker { ticker });
        }

        let amount = match action {
            Action::Sell => {
                if !state.is_held(&ticker) {
                    return Err(RejectionReason::SellNotHeld {
                        ticker,
                        holdings: state.holdings_list(),
                    });
                }
                proposal.amount_usd.unwrap_or(Decimal::ZERO)
            }
            Action::Hold => {
                if !state.is_held(&ticker) {
                    return Err(RejectionReason::HoldNotHeld {
                        ticker,
                        holdings: state.holdings_list(),
                    });
                }
                proposal.amount_usd.unwrap_or(Decimal::ZERO)
            }
            Action::Buy => {
                if state.is_held(&ticker) {
                    return Err(RejectionReason::AlreadyHeld { ticker });
                }
                self.check_buy_amount(proposal.amount_usd, state.funds())?
            }
        };

        Ok(ValidatedDecision::accepted(
            proposal.clone(),
            action,
            ticker,
            amount,
            reason.to_string(),
        ))
    }

    fn check_buy_amount(
        &self,
        amount: Option<Decimal>,
        funds: FundsView,
    ) -> Result<Decimal, RejectionReason> {
        let amount = amount.ok_or(RejectionReason::InvalidAmount)?;
        if amount < self.limits.min_buy {
            return Err(RejectionReason::BelowMinimum {
                amount,
                min: self.limits.min_buy,
            });
        }
        if amount > self.limits.max_buy {
            return Err(RejectionReason::AboveMaximum {
                amount,
                max: self.limits.max_buy,
            });
        }
        match funds {
            FundsView::Stale => Err(RejectionReason::FundsUnavailable),
            FundsView::Fresh(available) if amount > available => {
                Err(RejectionReason::ExceedsAvailableCash { amount, available })
            }
            FundsView::Fresh(_) => Ok(amount),
        }
    }
}

fn missing(field: &str) -> RejectionReason {
    RejectionReason::MissingField {
        field: field.to_string(),
    }
}
