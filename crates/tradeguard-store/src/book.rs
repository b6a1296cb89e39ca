use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tradeguard_core::types::{ExecutionRecord, Holding, TradeOutcome};

/// Everything persisted for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBook {
    pub cash: Decimal,
    /// Keyed by ticker
    pub holdings: BTreeMap<String, Holding>,
    pub executions: Vec<ExecutionRecord>,
    pub outcomes: Vec<TradeOutcome>,
}

impl AccountBook {
    pub fn executed_on(&self, day: NaiveDate) -> u32 {
        let count = self
            .executions
            .iter()
            .filter(|r| r.is_executed() && r.recorded_at.date_naive() == day)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// All accounts, keyed by account id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountBook>,
}

impl StoreState {
    pub fn book(&self, account: &str) -> Option<&AccountBook> {
        self.accounts.get(account)
    }

    pub fn book_mut(&mut self, account: &str) -> &mut AccountBook {
        self.accounts.entry(account.to_string()).or_default()
    }

    pub fn holdings(&self, account: &str) -> Vec<Holding> {
        self.book(account)
            .map(|b| b.holdings.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn holding(&self, account: &str, ticker: &str) -> Option<Holding> {
        self.book(account).and_then(|b| b.holdings.get(ticker).cloned())
    }

    pub fn cash(&self, account: &str) -> Decimal {
        self.book(account).map(|b| b.cash).unwrap_or(Decimal::ZERO)
    }

    pub fn executed_on(&self, account: &str, day: NaiveDate) -> u32 {
        self.book(account).map(|b| b.executed_on(day)).unwrap_or(0)
    }

    pub fn outcomes(&self, account: &str) -> Vec<TradeOutcome> {
        self.book(account)
            .map(|b| b.outcomes.clone())
            .unwrap_or_default()
    }

    pub fn executions(&self, account: &str) -> Vec<ExecutionRecord> {
        self.book(account)
            .map(|b| b.executions.clone())
            .unwrap_or_default()
    }
}
