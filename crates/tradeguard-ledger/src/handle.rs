//! Shared access to a ledger from the pipeline and the fill stream.

use futures::{Stream, StreamExt};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use tradeguard_core::types::{
    Balances, FillEvent, OpenOrder, SettlementMode, Side, Transaction,
};

use crate::ledger::{FundsLedger, LedgerError};
use crate::reconcile::ReconcileReport;
use crate::snapshot::LedgerSnapshot;

/// Cloneable handle to one account's ledger.
///
/// Every method takes the lock for the duration of a single mutation, so
/// reconciliation and streamed fills never interleave mid-update. The lock is
/// never held across an await point.
#[derive(Debug, Clone, Default)]
pub struct LedgerHandle {
    inner: Arc<Mutex<FundsLedger>>,
}

impl LedgerHandle {
    pub fn new(ledger: FundsLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FundsLedger> {
        // A panic mid-update cannot leave the figures half-written: every
        // mutation replaces whole values.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn seed(&self, balances: &Balances) {
        self.lock().seed(balances);
    }

    pub fn reconcile(&self, open_orders: &[OpenOrder], transactions: &[Transaction]) -> ReconcileReport {
        self.lock().reconcile(open_orders, transactions)
    }

    pub fn apply_fill(&self, side: Side, amount: Decimal, fees: Decimal) {
        self.lock().apply_fill(side, amount, fees);
    }

    pub fn apply_fill_event(&self, event: &FillEvent) -> bool {
        self.lock().apply_fill_event(event)
    }

    pub fn effective_funds(&self, allow_unsettled: bool) -> Decimal {
        self.lock().effective_funds(allow_unsettled)
    }

    pub fn fresh_effective_funds(&self, mode: SettlementMode) -> Result<Decimal, LedgerError> {
        self.lock().fresh_effective_funds(mode)
    }

    pub fn mark_stale(&self) {
        self.lock().mark_stale();
    }

    pub fn is_stale(&self) -> bool {
        self.lock().is_stale()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.lock().snapshot()
    }

    /// Copy of the ledger as it is now.
    pub fn ledger(&self) -> FundsLedger {
        self.lock().clone()
    }
}

/// Counters from draining a fill stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillStreamStats {
    pub applied: usize,
    pub ignored: usize,
}

/// Apply every fill from `fills` to the ledger until the stream ends.
pub async fn drain_fill_stream<S>(ledger: LedgerHandle, fills: S) -> FillStreamStats
where
    S: Stream<Item = FillEvent> + Unpin,
{
    let mut fills = fills;
    let mut stats = FillStreamStats::default();

    while let Some(event) = fills.next().await {
        if ledger.apply_fill_event(&event) {
            stats.applied += 1;
        } else {
            stats.ignored += 1;
        }
    }

    debug!(applied = stats.applied, ignored = stats.ignored, "fill stream closed");
    stats
}
