#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tradeguard_broker::{PaperBroker, PaperMarket};
use tradeguard_core::types::Holding;
use tradeguard_execution::{BatchPipeline, PipelineSettings, Services};
use tradeguard_risk::RiskLimits;
use tradeguard_store::MemoryStore;

pub const ACCOUNT: &str = "primary";

pub struct Harness {
    pub market: Arc<PaperMarket>,
    pub broker: Arc<PaperBroker>,
    pub store: MemoryStore,
    pub pipeline: BatchPipeline,
}

/// No cooldown and limits loose enough that only the rule under test bites.
pub fn settings() -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.execution.cooldown_secs = 0;
    settings.risk = RiskLimits {
        max_position_value: dec!(5000),
        max_total_investment: dec!(100000),
        min_cash_buffer: Decimal::ZERO,
        max_position_pct: Decimal::ONE,
        ..RiskLimits::default()
    };
    settings
}

pub fn harness(cash: Decimal, prices: &[(&str, Decimal)]) -> Harness {
    harness_with(cash, prices, settings(), MemoryStore::new())
}

pub fn harness_with(
    cash: Decimal,
    prices: &[(&str, Decimal)],
    settings: PipelineSettings,
    store: MemoryStore,
) -> Harness {
    let market = Arc::new(PaperMarket::new().with_prices(prices.iter().map(|(t, p)| (*t, *p))));
    let broker = Arc::new(PaperBroker::new(cash, market.clone()));
    let store = store.with_cash(ACCOUNT, cash);
    let services = Services::new(
        broker.clone(),
        market.clone(),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    );
    Harness {
        market,
        broker,
        store,
        pipeline: BatchPipeline::new(services, settings),
    }
}

pub const SECOND: &str = "second";

/// Like `harness_with`, but `SECOND` trades through its own paper brokerage
/// account. Returns the harness and the second account's broker.
pub fn two_broker_harness(
    cash: Decimal,
    prices: &[(&str, Decimal)],
    settings: PipelineSettings,
) -> (Harness, Arc<PaperBroker>) {
    let market = Arc::new(PaperMarket::new().with_prices(prices.iter().map(|(t, p)| (*t, *p))));
    let broker = Arc::new(PaperBroker::new(cash, market.clone()));
    let second = Arc::new(PaperBroker::new(cash, market.clone()));
    let store = MemoryStore::new()
        .with_cash(ACCOUNT, cash)
        .with_cash(SECOND, cash);
    let services = Services::new(
        broker.clone(),
        market.clone(),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    )
    .with_account_broker(SECOND, second.clone());
    let harness = Harness {
        market,
        broker,
        store,
        pipeline: BatchPipeline::new(services, settings),
    };
    (harness, second)
}

pub fn holding(ticker: &str, shares: Decimal, avg_cost: Decimal) -> Holding {
    Holding::open(ticker, shares, avg_cost, shares * avg_cost, "seeded", Utc::now())
}
