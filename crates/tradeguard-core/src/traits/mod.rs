//! Collaborator traits.

mod broker;
mod market_data;
mod store;

pub use broker::Broker;
pub use market_data::MarketData;
pub use store::{HoldingsStore, TradeJournal};
