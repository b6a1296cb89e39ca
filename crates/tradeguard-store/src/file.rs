//! JSON file backed holdings store and trade journal.
//!
//! The whole state lives in one pretty-printed JSON document. Every write
//! goes to a sibling temp file that is then renamed over the original, so a
//! crash mid-write leaves the previous state intact.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};
use tradeguard_core::error::StoreError;
use tradeguard_core::traits::{HoldingsStore, TradeJournal};
use tradeguard_core::types::{ExecutionRecord, Holding, TradeOutcome};

use crate::book::StoreState;

/// Store persisted to a JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty when the file does not exist.
    ///
    /// An unreadable document is an error, never an empty start.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::Corrupt(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No store file found, starting empty");
                StoreState::default()
            }
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to a copy of the state, write it out, then commit it in
    /// memory. A failed write leaves both file and memory unchanged.
    async fn mutate<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreState),
    {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        f(&mut next);
        self.write(&next).await?;
        *state = next;
        Ok(())
    }

    async fn write(&self, state: &StoreState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }

        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        debug!(path = %self.path.display(), "Saved store state");
        Ok(())
    }
}

#[async_trait]
impl HoldingsStore for JsonFileStore {
    async fn holdings(&self, account: &str) -> Result<Vec<Holding>, StoreError> {
        Ok(self.state.lock().await.holdings(account))
    }

    async fn holding(&self, account: &str, ticker: &str) -> Result<Option<Holding>, StoreError> {
        Ok(self.state.lock().await.holding(account, ticker))
    }

    async fn upsert_holding(&self, account: &str, holding: &Holding) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.book_mut(account)
                .holdings
                .insert(holding.ticker.clone(), holding.clone());
        })
        .await
    }

    async fn cash(&self, account: &str) -> Result<Decimal, StoreError> {
        Ok(self.state.lock().await.cash(account))
    }

    async fn set_cash(&self, account: &str, cash: Decimal) -> Result<(), StoreError> {
        self.mutate(|s| s.book_mut(account).cash = cash).await
    }
}

#[async_trait]
impl TradeJournal for JsonFileStore {
    async fn record_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.mutate(|s| s.book_mut(&record.account).executions.push(record.clone()))
            .await
    }

    async fn record_outcome(&self, account: &str, outcome: &TradeOutcome) -> Result<(), StoreError> {
        self.mutate(|s| s.book_mut(account).outcomes.push(outcome.clone()))
            .await
    }

    async fn executed_trades_on(&self, account: &str, day: NaiveDate) -> Result<u32, StoreError> {
        Ok(self.state.lock().await.executed_on(account, day))
    }

    async fn outcomes(&self, account: &str) -> Result<Vec<TradeOutcome>, StoreError> {
        Ok(self.state.lock().await.outcomes(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tradeguard_core::types::{Action, ExecutionStatus};

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        let holding = Holding::open("MSFT", dec!(4), dec!(400), dec!(1600), "cloud", Utc::now());
        store.upsert_holding("acct", &holding).await.unwrap();
        store.set_cash("acct", dec!(8400)).await.unwrap();
        store
            .record_execution(&ExecutionRecord {
                account: "acct".to_string(),
                action: Action::Buy,
                ticker: "MSFT".to_string(),
                amount_usd: dec!(1600),
                proposal_reason: "cloud".to_string(),
                status: ExecutionStatus::Executed {
                    shares: dec!(4),
                    price: dec!(400),
                    amount: dec!(1600),
                    order_id: None,
                    persist_error: None,
                },
                recorded_at: Utc::now(),
            })
            .await
            .unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.cash("acct").await.unwrap(), dec!(8400));
        assert_eq!(reopened.holding("acct", "MSFT").await.unwrap(), Some(holding));
        let today = Utc::now().date_naive();
        assert_eq!(reopened.executed_trades_on("acct", today).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("nested/store.json"))
            .await
            .unwrap();
        assert!(store.holdings("acct").await.unwrap().is_empty());

        store.set_cash("acct", dec!(10)).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
