use std::collections::HashMap;
use std::sync::Arc;
use tradeguard_core::traits::{Broker, HoldingsStore, MarketData, TradeJournal};

/// External collaborators, built once at startup and shared by every batch.
///
/// Each account reads broker truth and places orders through its own broker
/// connection. Accounts registered without one use the default broker, which
/// makes them views of the same brokerage account.
#[derive(Clone)]
pub struct Services {
    default_broker: Arc<dyn Broker>,
    account_brokers: HashMap<String, Arc<dyn Broker>>,
    pub market: Arc<dyn MarketData>,
    pub holdings: Arc<dyn HoldingsStore>,
    pub journal: Arc<dyn TradeJournal>,
}

impl Services {
    pub fn new(
        broker: Arc<dyn Broker>,
        market: Arc<dyn MarketData>,
        holdings: Arc<dyn HoldingsStore>,
        journal: Arc<dyn TradeJournal>,
    ) -> Self {
        Self {
            default_broker: broker,
            account_brokers: HashMap::new(),
            market,
            holdings,
            journal,
        }
    }

    /// Route `account` to its own broker connection.
    pub fn with_account_broker(mut self, account: impl Into<String>, broker: Arc<dyn Broker>) -> Self {
        self.account_brokers.insert(account.into(), broker);
        self
    }

    /// The broker holding `account`'s cash and positions.
    pub fn broker_for(&self, account: &str) -> &Arc<dyn Broker> {
        self.account_brokers.get(account).unwrap_or(&self.default_broker)
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("default_broker", &self.default_broker.name())
            .field("account_brokers", &self.account_brokers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
