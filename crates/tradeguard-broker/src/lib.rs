//! Broker and market data integrations.

mod alpaca;
mod market;
mod paper;

pub use alpaca::{AlpacaMarketData, AlpacaSettings};
pub use market::PaperMarket;
pub use paper::PaperBroker;
