//! Paper trading broker for simulation.
//!
//! Market orders fill immediately at the paper market's price. Same-day fills
//! stay unsettled until [`PaperBroker::settle`] is called, so the account
//! reports a settled cash baseline plus booked transactions the way a real
//! cash account does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};
use tradeguard_core::error::BrokerError;
use tradeguard_core::traits::Broker;
use tradeguard_core::types::{
    AccountSnapshot, Balances, BrokerPosition, FillEvent, OpenOrder, OrderAck, OrderStatus,
    Side, Transaction, TransactionKind,
};
use uuid::Uuid;

use crate::market::PaperMarket;

const FILL_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct PaperAccount {
    settled_cash: Decimal,
    /// Net cash flow of fills not yet settled
    unsettled_net: Decimal,
    positions: HashMap<String, BrokerPosition>,
    open_orders: Vec<OpenOrder>,
    transactions: Vec<Transaction>,
    /// Failure returned by the next snapshot/transactions reads
    outage: Option<BrokerError>,
    rejected_tickers: Vec<String>,
}

/// Paper trading broker.
pub struct PaperBroker {
    account: Arc<Mutex<PaperAccount>>,
    market: Arc<PaperMarket>,
    commission_per_share: Decimal,
    fills: broadcast::Sender<FillEvent>,
}

impl PaperBroker {
    /// Create a paper broker with settled starting cash.
    pub fn new(initial_cash: Decimal, market: Arc<PaperMarket>) -> Self {
        let (fills, _) = broadcast::channel(FILL_CHANNEL_CAPACITY);
        let account = PaperAccount {
            settled_cash: initial_cash,
            ..Default::default()
        };
        Self {
            account: Arc::new(Mutex::new(account)),
            market,
            commission_per_share: Decimal::ZERO,
            fills,
        }
    }

    /// Set commission per share.
    pub fn with_commission(mut self, commission: Decimal) -> Self {
        self.commission_per_share = commission;
        self
    }

    /// Start with an existing position.
    pub fn with_position(self, ticker: &str, quantity: Decimal, avg_price: Decimal) -> Self {
        {
            let mut account = self.lock();
            let ticker = ticker.to_uppercase();
            account.positions.insert(
                ticker.clone(),
                BrokerPosition {
                    ticker,
                    quantity,
                    avg_price,
                    market_value: quantity * avg_price,
                },
            );
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, PaperAccount> {
        self.account.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Live stream of fills as they happen.
    pub fn subscribe_fills(&self) -> impl Stream<Item = FillEvent> + Unpin + Send + 'static {
        BroadcastStream::new(self.fills.subscribe())
            .filter_map(|event| futures::future::ready(event.ok()))
    }

    /// Add a resting order, e.g. a limit buy that has not filled.
    pub fn add_open_order(&self, order: OpenOrder) {
        self.lock().open_orders.push(order);
    }

    /// Make account reads fail until cleared.
    pub fn set_outage(&self, outage: Option<BrokerError>) {
        self.lock().outage = outage;
    }

    /// Make orders for `ticker` come back rejected.
    pub fn reject_orders_for(&self, ticker: &str) {
        self.lock().rejected_tickers.push(ticker.to_uppercase());
    }

    /// Settle every fill: unsettled cash moves into the settled balance and
    /// the day's transactions are archived.
    pub fn settle(&self) {
        let mut account = self.lock();
        let net = std::mem::take(&mut account.unsettled_net);
        account.settled_cash += net;
        account.transactions.clear();
        info!(settled_cash = %account.settled_cash, "paper account settled");
    }

    /// Current position quantity for a ticker.
    pub fn position_quantity(&self, ticker: &str) -> Decimal {
        self.lock()
            .positions
            .get(&ticker.to_uppercase())
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    fn fill(
        &self,
        ticker: &str,
        quantity: Decimal,
        side: Side,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<FillEvent, BrokerError> {
        let mut account = self.lock();
        if account.rejected_tickers.iter().any(|t| t == ticker) {
            return Err(BrokerError::OrderRejected(format!(
                "{} not tradable",
                ticker
            )));
        }

        let gross = price * quantity;
        let fees = self.commission_per_share * quantity;

        match side {
            Side::Buy => {
                let available = account.settled_cash + account.unsettled_net;
                if gross + fees > available {
                    return Err(BrokerError::InsufficientFunds {
                        required: gross + fees,
                        available,
                    });
                }
                account.unsettled_net -= gross + fees;
                let position = account
                    .positions
                    .entry(ticker.to_string())
                    .or_insert_with(|| BrokerPosition {
                        ticker: ticker.to_string(),
                        quantity: Decimal::ZERO,
                        avg_price: Decimal::ZERO,
                        market_value: Decimal::ZERO,
                    });
                let new_quantity = position.quantity + quantity;
                position.avg_price =
                    (position.avg_price * position.quantity + gross) / new_quantity;
                position.quantity = new_quantity;
                position.market_value = new_quantity * price;
            }
            Side::Sell => {
                let held = account
                    .positions
                    .get(ticker)
                    .map(|p| p.quantity)
                    .unwrap_or(Decimal::ZERO);
                if quantity > held {
                    return Err(BrokerError::PositionNotFound(format!(
                        "{}: holding {} shares, asked to sell {}",
                        ticker, held, quantity
                    )));
                }
                account.unsettled_net += gross - fees;
                if quantity == held {
                    account.positions.remove(ticker);
                } else if let Some(position) = account.positions.get_mut(ticker) {
                    position.quantity -= quantity;
                    position.market_value = position.quantity * price;
                }
            }
        }

        let event = FillEvent {
            id: Uuid::new_v4().to_string(),
            side,
            amount: gross,
            fees,
            occurred_at: at,
        };
        account.transactions.push(Transaction {
            id: event.id.clone(),
            kind: TransactionKind::Trade,
            side: Some(side),
            ticker: Some(ticker.to_string()),
            amount: gross,
            fees,
            occurred_at: at,
        });
        Ok(event)
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn get_account_snapshot(&self) -> Result<AccountSnapshot, BrokerError> {
        let account = self.lock();
        if let Some(outage) = &account.outage {
            return Err(outage.clone());
        }

        let positions = account
            .positions
            .values()
            .map(|p| {
                let price = self.market.price(&p.ticker).unwrap_or(p.avg_price);
                BrokerPosition {
                    market_value: p.quantity * price,
                    ..p.clone()
                }
            })
            .collect();

        Ok(AccountSnapshot {
            balances: Balances {
                total_cash: account.settled_cash,
                cash_available_for_trading: (account.settled_cash
                    + account.unsettled_net.min(Decimal::ZERO))
                .max(Decimal::ZERO),
                unsettled_cash: account.unsettled_net.max(Decimal::ZERO),
            },
            positions,
            open_orders: account
                .open_orders
                .iter()
                .filter(|o| o.status.is_active())
                .cloned()
                .collect(),
        })
    }

    async fn place_order(
        &self,
        ticker: &str,
        quantity: Decimal,
        side: Side,
    ) -> Result<OrderAck, BrokerError> {
        if quantity <= Decimal::ZERO {
            return Err(BrokerError::OrderRejected(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }
        if !self.market.is_open() {
            return Err(BrokerError::MarketClosed);
        }
        let ticker = ticker.to_uppercase();
        let price = self
            .market
            .price(&ticker)
            .ok_or_else(|| BrokerError::OrderRejected(format!("no market for {}", ticker)))?;

        let event = self.fill(&ticker, quantity, side, price, Utc::now())?;
        debug!(%ticker, %side, %quantity, %price, fill_id = %event.id, "paper order filled");

        let order_id = event.id.clone();
        // No subscribers is fine
        let _ = self.fills.send(event);

        Ok(OrderAck {
            order_id,
            status: OrderStatus::Filled,
        })
    }

    async fn get_transactions(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, BrokerError> {
        let account = self.lock();
        if let Some(outage) = &account.outage {
            return Err(outage.clone());
        }
        Ok(account
            .transactions
            .iter()
            .filter(|tx| tx.occurred_at >= since)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "Paper Broker"
    }
}
