//! One batch, end to end: broker truth, ledger, validation, risk review and
//! execution, serialized per account.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use tradeguard_core::error::{BrokerError, StoreError};
use tradeguard_core::types::{AccountSnapshot, PortfolioSnapshot, Transaction};
use tradeguard_ledger::{LedgerHandle, LedgerSnapshot, ReconcileReport};
use tradeguard_risk::{GovernorReport, ReviewContext, RiskGovernor, RiskLimits};
use tradeguard_validator::{
    BuyLimits, FundsView, ProposalValidator, ValidationReport, ValidatorState,
};

use crate::sequencer::{ExecutionReport, ExecutionSequencer};
use crate::services::Services;
use crate::settings::{AccountPolicy, ExecutionSettings};

/// Failures that abort a whole batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// No safe funds figure can be produced without the broker
    #[error("broker unreachable for account {account}: {source}")]
    BrokerUnreachable {
        account: String,
        #[source]
        source: BrokerError,
    },

    /// The holdings snapshot every check is made against cannot be read
    #[error("holdings store unavailable for account {account}: {source}")]
    HoldingsUnavailable {
        account: String,
        #[source]
        source: StoreError,
    },
}

/// Everything that happened to one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub account: String,
    pub validation: ValidationReport,
    pub governance: GovernorReport,
    pub execution: ExecutionReport,
    /// Present when broker truth was fetched
    pub reconcile: Option<ReconcileReport>,
    /// Ledger after execution
    pub ledger: LedgerSnapshot,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn funds_stale(&self) -> bool {
        self.ledger.stale
    }
}

/// Pipeline-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub buy_limits: BuyLimits,
    pub risk: RiskLimits,
    pub execution: ExecutionSettings,
    /// Policy for accounts without an entry in `accounts`
    pub default_account: AccountPolicy,
    pub accounts: BTreeMap<String, AccountPolicy>,
}

impl PipelineSettings {
    pub fn policy(&self, account: &str) -> &AccountPolicy {
        self.accounts.get(account).unwrap_or(&self.default_account)
    }
}

/// Runs proposal batches against shared services.
///
/// Batches for one account run one at a time; different accounts proceed
/// concurrently. Each account keeps its own shadow ledger across batches;
/// the per-account lock and ledger stay resident until `release_account`.
pub struct BatchPipeline {
    services: Services,
    settings: PipelineSettings,
    governor: RiskGovernor,
    sequencer: ExecutionSequencer,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    ledgers: Mutex<HashMap<String, LedgerHandle>>,
}

impl BatchPipeline {
    pub fn new(services: Services, settings: PipelineSettings) -> Self {
        Self {
            governor: RiskGovernor::new(settings.risk.clone()),
            sequencer: ExecutionSequencer::new(settings.execution.clone()),
            services,
            settings,
            locks: Mutex::new(HashMap::new()),
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    fn account_lock(&self, account: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(account.to_string()).or_default().clone()
    }

    /// The account's ledger, created on first use.
    pub fn ledger(&self, account: &str) -> LedgerHandle {
        let mut ledgers = self.ledgers.lock().unwrap_or_else(|e| e.into_inner());
        ledgers.entry(account.to_string()).or_default().clone()
    }

    /// Forget an idle account's lock and ledger.
    ///
    /// Returns false and keeps both while a batch for the account is running
    /// or queued. The next batch reseeds the ledger from the broker.
    pub fn release_account(&self, account: &str) -> bool {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(account) {
            if Arc::strong_count(lock) > 1 {
                return false;
            }
        }
        locks.remove(account);
        self.ledgers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(account);
        debug!(account, "account released");
        true
    }

    /// Validate, govern and execute one raw proposal batch.
    ///
    /// Only an unreachable broker or unreadable holdings abort the batch;
    /// every other failure degrades to a recorded rejection or skip.
    pub async fn run_batch(&self, account: &str, raw: &Value) -> Result<BatchReport, PipelineError> {
        let lock = self.account_lock(account);
        let _guard = lock.lock().await;

        let started_at = Utc::now();
        let day = started_at.date_naive();
        let policy = self.settings.policy(account).clone();
        let ledger = self.ledger(account);

        let reconcile = self.refresh_ledger(account, &ledger, day).await?;

        let funds = match ledger.fresh_effective_funds(policy.settlement_mode) {
            Ok(funds) => FundsView::Fresh(funds),
            Err(e) => {
                warn!(account, error = %e, "funds unavailable, no buys this batch");
                FundsView::Stale
            }
        };

        let holdings = self.services.holdings.holdings(account).await.map_err(|source| {
            error!(account, error = %source, "holdings unreadable, batch aborted");
            PipelineError::HoldingsUnavailable {
                account: account.to_string(),
                source,
            }
        })?;
        let cash = match self.services.holdings.cash(account).await {
            Ok(cash) => cash,
            Err(e) => {
                warn!(account, error = %e, "cash unreadable, treating as zero");
                Decimal::ZERO
            }
        };
        let portfolio = PortfolioSnapshot::new(cash, holdings);

        let validator = ProposalValidator::new(self.settings.buy_limits.clone(), policy.settlement_mode);
        let validation =
            validator.validate_json(raw, ValidatorState::from_holdings(&portfolio.holdings, funds));

        let initial_value = if policy.initial_value > Decimal::ZERO {
            policy.initial_value
        } else {
            portfolio.total_value()
        };
        let spendable = match funds {
            FundsView::Fresh(funds) => funds.min(cash),
            FundsView::Stale => Decimal::ZERO,
        };
        let ctx = ReviewContext {
            account,
            day,
            portfolio: &portfolio,
            cash: spendable,
            initial_value,
            reuse_sale_proceeds: policy.settlement_mode.allow_unsettled(),
        };
        let governance = self
            .governor
            .review_batch(validation.accepted.clone(), &ctx, self.services.journal.as_ref())
            .await;

        let execution = self
            .sequencer
            .execute(&self.services, &ledger, account, governance.approved_decisions())
            .await;

        let report = BatchReport {
            account: account.to_string(),
            validation,
            governance,
            execution,
            reconcile,
            ledger: ledger.snapshot(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            account,
            accepted = report.validation.accepted.len(),
            rejected = report.validation.rejected.len(),
            blocked = report.governance.blocked.len(),
            executed = report.execution.executed().count(),
            effective_funds = %report.ledger.effective_funds_settled_only,
            "batch complete"
        );
        Ok(report)
    }

    /// Seed and reconcile from broker truth, or mark the ledger stale.
    async fn refresh_ledger(
        &self,
        account: &str,
        ledger: &LedgerHandle,
        day: NaiveDate,
    ) -> Result<Option<ReconcileReport>, PipelineError> {
        let fetched = match self.fetch_snapshot(account).await {
            Ok(snapshot) => match self.fetch_transactions(account, day).await {
                Ok(transactions) => Ok((snapshot, transactions)),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match fetched {
            Ok((snapshot, transactions)) => {
                ledger.seed(&snapshot.balances);
                Ok(Some(ledger.reconcile(&snapshot.open_orders, &transactions)))
            }
            Err(e) if e.is_unreachable() => {
                ledger.mark_stale();
                error!(account, error = %e, broker = self.services.broker_for(account).name(), "broker unreachable, batch aborted");
                Err(PipelineError::BrokerUnreachable {
                    account: account.to_string(),
                    source: e,
                })
            }
            Err(e) => {
                ledger.mark_stale();
                warn!(account, error = %e, "broker truth unavailable, ledger marked stale");
                Ok(None)
            }
        }
    }

    async fn fetch_snapshot(&self, account: &str) -> Result<AccountSnapshot, BrokerError> {
        let limit = self.settings.execution.broker_timeout();
        timeout(limit, self.services.broker_for(account).get_account_snapshot())
            .await
            .unwrap_or_else(|_| Err(BrokerError::Timeout(limit.as_millis() as u64)))
    }

    async fn fetch_transactions(
        &self,
        account: &str,
        day: NaiveDate,
    ) -> Result<Vec<Transaction>, BrokerError> {
        let limit = self.settings.execution.broker_timeout();
        let since = day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        timeout(limit, self.services.broker_for(account).get_transactions(since))
            .await
            .unwrap_or_else(|_| Err(BrokerError::Timeout(limit.as_millis() as u64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_lookup_falls_back_to_default() {
        let mut settings = PipelineSettings::default();
        settings.accounts.insert(
            "margin".to_string(),
            AccountPolicy {
                settlement_mode: tradeguard_core::types::SettlementMode::SameDayReuse,
                initial_value: Decimal::ZERO,
            },
        );

        assert!(settings.policy("margin").settlement_mode.allow_unsettled());
        assert!(!settings.policy("cash").settlement_mode.allow_unsettled());
    }
}
