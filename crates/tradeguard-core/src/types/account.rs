//! Broker-side account state: balances, positions, transactions and fills.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OpenOrder, Side};

/// How same-day sale proceeds may be used for new buys.
///
/// Cash accounts must wait for settlement or risk a good-faith violation;
/// margin-style accounts can recycle proceeds immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    /// Only settled cash funds new buys
    #[default]
    SettledOnly,
    /// Unsettled sale proceeds may fund new buys
    SameDayReuse,
}

impl SettlementMode {
    pub fn allow_unsettled(&self) -> bool {
        matches!(self, SettlementMode::SameDayReuse)
    }
}

/// Cash balances as reported by the broker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    /// Total cash, settled baseline for the shadow ledger
    pub total_cash: Decimal,
    /// What the broker itself says may be traded
    #[serde(default)]
    pub cash_available_for_trading: Decimal,
    /// Cash the broker reports as not yet settled
    #[serde(default)]
    pub unsettled_cash: Decimal,
}

/// A position as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub ticker: String,
    pub quantity: Decimal,
    pub avg_price: Decimal,
    pub market_value: Decimal,
}

/// Everything the broker reports about the account in one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balances: Balances,
    #[serde(default)]
    pub positions: Vec<BrokerPosition>,
    #[serde(default)]
    pub open_orders: Vec<OpenOrder>,
}

/// Broker transaction category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Trade,
    Dividend,
    Fee,
    Transfer,
    Other,
}

/// A booked broker transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    /// Side for trades
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub ticker: Option<String>,
    /// Gross amount; the sign is broker-specific and ignored
    pub amount: Decimal,
    #[serde(default)]
    pub fees: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// A single fill pushed from the broker's live activity stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    /// Broker activity id; matches the id of the transaction it later books as
    pub id: String,
    pub side: Side,
    /// Gross fill amount (price * quantity)
    pub amount: Decimal,
    #[serde(default)]
    pub fees: Decimal,
    pub occurred_at: DateTime<Utc>,
}
