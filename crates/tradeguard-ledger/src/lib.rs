//! Shadow funds ledger.
//!
//! Keeps a trustworthy "funds safely available for new orders" figure
//! between broker snapshots: seeded from broker balances, nudged by streamed
//! fills, and periodically replaced by reconciliation against open orders and
//! the day's booked transactions.

mod handle;
mod ledger;
mod reconcile;
mod snapshot;

pub use handle::{drain_fill_stream, FillStreamStats, LedgerHandle};
pub use ledger::{FundsLedger, FundsLedgerState, LedgerError};
pub use reconcile::{IntradayFigures, ReconcileReport};
pub use snapshot::LedgerSnapshot;
