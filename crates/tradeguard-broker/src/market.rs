//! In-memory market for simulation and tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tradeguard_core::error::DataError;
use tradeguard_core::traits::MarketData;

#[derive(Debug, Default)]
struct MarketState {
    prices: HashMap<String, Decimal>,
    failing: HashMap<String, DataError>,
    latency: Option<Duration>,
}

/// Settable prices and market clock.
#[derive(Debug)]
pub struct PaperMarket {
    state: RwLock<MarketState>,
    open: AtomicBool,
}

impl Default for PaperMarket {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperMarket {
    /// An open market with no prices.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MarketState::default()),
            open: AtomicBool::new(true),
        }
    }

    /// Seed prices up front.
    pub fn with_prices<I, S>(self, prices: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        for (ticker, price) in prices {
            self.set_price(ticker, price);
        }
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, MarketState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MarketState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_price(&self, ticker: impl Into<String>, price: Decimal) {
        self.write().prices.insert(ticker.into().to_uppercase(), price);
    }

    pub fn remove_price(&self, ticker: &str) {
        self.write().prices.remove(&ticker.to_uppercase());
    }

    /// Latest price without going through the async trait.
    pub fn price(&self, ticker: &str) -> Option<Decimal> {
        self.read().prices.get(&ticker.to_uppercase()).copied()
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Make price requests for `ticker` fail with a connection error.
    pub fn fail_ticker(&self, ticker: &str) {
        let error = DataError::ConnectionError(format!(
            "price feed unavailable for {}",
            ticker.to_uppercase()
        ));
        self.fail_ticker_with(ticker, error);
    }

    /// Make price requests for `ticker` fail with `error`.
    pub fn fail_ticker_with(&self, ticker: &str, error: DataError) {
        self.write().failing.insert(ticker.to_uppercase(), error);
    }

    /// Delay every price request, to exercise caller timeouts.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.write().latency = latency;
    }
}

#[async_trait]
impl MarketData for PaperMarket {
    async fn get_last_price(&self, ticker: &str) -> Result<Option<Decimal>, DataError> {
        let latency = self.read().latency;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        let state = self.read();
        let ticker = ticker.to_uppercase();
        if let Some(error) = state.failing.get(&ticker) {
            return Err(error.clone());
        }
        Ok(state.prices.get(&ticker).copied())
    }

    async fn is_market_open(&self) -> Result<bool, DataError> {
        Ok(self.is_open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_prices_and_clock() {
        let market = PaperMarket::new().with_prices([("aapl", dec!(150))]);

        assert_eq!(market.get_last_price("AAPL").await.unwrap(), Some(dec!(150)));
        assert_eq!(market.get_last_price("MSFT").await.unwrap(), None);
        assert!(market.is_market_open().await.unwrap());

        market.set_open(false);
        assert!(!market.is_market_open().await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_ticker() {
        let market = PaperMarket::new().with_prices([("AAPL", dec!(150))]);
        market.fail_ticker("aapl");

        let err = market.get_last_price("AAPL").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_ticker_fails_with_chosen_error() {
        let market = PaperMarket::new();
        market.fail_ticker_with("zzzz", DataError::SymbolNotFound("ZZZZ".into()));

        let err = market.get_last_price("ZZZZ").await.unwrap_err();
        assert_eq!(err, DataError::SymbolNotFound("ZZZZ".into()));
        assert!(!err.is_transient());
    }
}
