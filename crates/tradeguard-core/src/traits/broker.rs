//! Broker trait definition.

use crate::error::BrokerError;
use crate::types::{AccountSnapshot, OrderAck, Side, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Trait for broker integrations.
///
/// Only the slice of a brokerage API the guard needs: account truth for the
/// shadow ledger, order placement, and booked transactions for reconciliation.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Balances, positions and open orders in one consistent read.
    async fn get_account_snapshot(&self) -> Result<AccountSnapshot, BrokerError>;

    /// Place a market order for a whole number of shares.
    ///
    /// # Arguments
    /// * `ticker` - Normalized symbol
    /// * `quantity` - Whole shares, must be positive
    /// * `side` - Buy or sell
    async fn place_order(
        &self,
        ticker: &str,
        quantity: Decimal,
        side: Side,
    ) -> Result<OrderAck, BrokerError>;

    /// Transactions booked at or after `since`.
    async fn get_transactions(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, BrokerError>;

    /// Get the broker name.
    fn name(&self) -> &str;
}
