//! In-memory holdings store and trade journal.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};
use tradeguard_core::error::StoreError;
use tradeguard_core::traits::{HoldingsStore, TradeJournal};
use tradeguard_core::types::{ExecutionRecord, Holding, TradeOutcome};

use crate::book::StoreState;

#[derive(Debug, Default)]
struct Faults {
    holding_writes: Option<StoreError>,
    cash_writes: Option<StoreError>,
    trade_counts: Option<StoreError>,
}

/// Holdings and journal kept in process memory.
///
/// Clones share the same state. Individual operations can be made to fail,
/// so callers' handling of persistence errors can be exercised.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account's cash balance.
    pub fn with_cash(self, account: &str, cash: Decimal) -> Self {
        self.lock().book_mut(account).cash = cash;
        self
    }

    /// Seed a holding row.
    pub fn with_holding(self, account: &str, holding: Holding) -> Self {
        self.lock()
            .book_mut(account)
            .holdings
            .insert(holding.ticker.clone(), holding);
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail every holding upsert with `error` (or stop failing with `None`).
    pub fn fail_holding_writes(&self, error: Option<StoreError>) {
        self.faults().holding_writes = error;
    }

    pub fn fail_cash_writes(&self, error: Option<StoreError>) {
        self.faults().cash_writes = error;
    }

    /// Fail the daily executed-trade count.
    pub fn fail_trade_counts(&self, error: Option<StoreError>) {
        self.faults().trade_counts = error;
    }

    /// Every journal row for the account, oldest first.
    pub fn executions(&self, account: &str) -> Vec<ExecutionRecord> {
        self.lock().executions(account)
    }

    /// A copy of the whole state.
    pub fn dump(&self) -> StoreState {
        self.lock().clone()
    }
}

#[async_trait]
impl HoldingsStore for MemoryStore {
    async fn holdings(&self, account: &str) -> Result<Vec<Holding>, StoreError> {
        Ok(self.lock().holdings(account))
    }

    async fn holding(&self, account: &str, ticker: &str) -> Result<Option<Holding>, StoreError> {
        Ok(self.lock().holding(account, ticker))
    }

    async fn upsert_holding(&self, account: &str, holding: &Holding) -> Result<(), StoreError> {
        if let Some(err) = self.faults().holding_writes.clone() {
            return Err(err);
        }
        self.lock()
            .book_mut(account)
            .holdings
            .insert(holding.ticker.clone(), holding.clone());
        Ok(())
    }

    async fn cash(&self, account: &str) -> Result<Decimal, StoreError> {
        Ok(self.lock().cash(account))
    }

    async fn set_cash(&self, account: &str, cash: Decimal) -> Result<(), StoreError> {
        if let Some(err) = self.faults().cash_writes.clone() {
            return Err(err);
        }
        self.lock().book_mut(account).cash = cash;
        Ok(())
    }
}

#[async_trait]
impl TradeJournal for MemoryStore {
    async fn record_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.lock()
            .book_mut(&record.account)
            .executions
            .push(record.clone());
        Ok(())
    }

    async fn record_outcome(&self, account: &str, outcome: &TradeOutcome) -> Result<(), StoreError> {
        self.lock().book_mut(account).outcomes.push(outcome.clone());
        Ok(())
    }

    async fn executed_trades_on(&self, account: &str, day: NaiveDate) -> Result<u32, StoreError> {
        if let Some(err) = self.faults().trade_counts.clone() {
            return Err(err);
        }
        Ok(self.lock().executed_on(account, day))
    }

    async fn outcomes(&self, account: &str) -> Result<Vec<TradeOutcome>, StoreError> {
        Ok(self.lock().outcomes(account))
    }
}
