//! Persistence traits for holdings and the trade journal.

use crate::error::StoreError;
use crate::types::{ExecutionRecord, Holding, TradeOutcome};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Holdings table keyed by (account, ticker), plus the account's cash row.
#[async_trait]
pub trait HoldingsStore: Send + Sync {
    /// Every holding row of the account, active or not.
    async fn holdings(&self, account: &str) -> Result<Vec<Holding>, StoreError>;

    /// A single holding row.
    async fn holding(&self, account: &str, ticker: &str) -> Result<Option<Holding>, StoreError>;

    /// Insert or replace a holding row.
    async fn upsert_holding(&self, account: &str, holding: &Holding) -> Result<(), StoreError>;

    /// Current cash balance.
    async fn cash(&self, account: &str) -> Result<Decimal, StoreError>;

    /// Overwrite the cash balance.
    async fn set_cash(&self, account: &str, cash: Decimal) -> Result<(), StoreError>;
}

/// Durable record of every execution attempt and every realized outcome.
#[async_trait]
pub trait TradeJournal: Send + Sync {
    async fn record_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    async fn record_outcome(&self, account: &str, outcome: &TradeOutcome)
        -> Result<(), StoreError>;

    /// Number of executed trades for the account on `day`.
    async fn executed_trades_on(&self, account: &str, day: NaiveDate) -> Result<u32, StoreError>;

    /// Realized outcomes for the account, oldest first.
    async fn outcomes(&self, account: &str) -> Result<Vec<TradeOutcome>, StoreError>;
}
