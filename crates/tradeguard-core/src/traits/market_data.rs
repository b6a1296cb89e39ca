//! Market data trait definition.

use crate::error::DataError;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Last-price and market-clock source.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Latest trade price, `None` when the source has no usable quote.
    async fn get_last_price(&self, ticker: &str) -> Result<Option<Decimal>, DataError>;

    /// Whether the regular session is currently open.
    async fn is_market_open(&self) -> Result<bool, DataError>;
}
