mod common;

use common::{harness, harness_with, holding, settings, ACCOUNT};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tradeguard_core::error::{BrokerError, DataError, StoreError};
use tradeguard_core::traits::{HoldingsStore, TradeJournal};
use tradeguard_core::types::{ExecutionStatus, OutcomeCategory, SkipReason};
use tradeguard_execution::{BatchPhase, PipelineError};
use tradeguard_risk::SafetyViolation;
use tradeguard_store::MemoryStore;
use tradeguard_validator::RejectionReason;

#[tokio::test]
async fn test_sell_closes_position_and_credits_cash() {
    let store = MemoryStore::new().with_holding(ACCOUNT, holding("AAPL", dec!(10), dec!(150)));
    let h = harness_with(dec!(500), &[("AAPL", dec!(170))], settings(), store);

    let batch = json!([{"action": "sell", "ticker": "AAPL", "amount_usd": 0, "reason": "target reached"}]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    assert_eq!(report.validation.accepted.len(), 1);
    assert_eq!(report.execution.executed().count(), 1);

    let aapl = h.store.holding(ACCOUNT, "AAPL").await.unwrap().unwrap();
    assert!(!aapl.active);
    assert_eq!(aapl.shares, Decimal::ZERO);
    assert_eq!(h.store.cash(ACCOUNT).await.unwrap(), dec!(2200));

    let outcomes = h.store.outcomes(ACCOUNT).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].realized_pl, dec!(200));
    assert_eq!(outcomes[0].outcome_category, OutcomeCategory::SignificantProfit);
    assert_eq!(outcomes[0].exit_reason, "target reached");

    // Proceeds are unsettled: only same-day reuse may spend them
    assert_eq!(report.ledger.effective_funds_settled_only, dec!(500));
    assert_eq!(report.ledger.effective_funds_same_day_reuse, dec!(2200));
}

#[tokio::test]
async fn test_sells_run_before_buys_and_phases_are_recorded() {
    let store = MemoryStore::new().with_holding(ACCOUNT, holding("AAPL", dec!(10), dec!(150)));
    let h = harness_with(
        dec!(5000),
        &[("AAPL", dec!(160)), ("MSFT", dec!(400))],
        settings(),
        store,
    );

    let batch = json!([
        {"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "cloud growth"},
        {"action": "sell", "ticker": "AAPL", "reason": "rotate"}
    ]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    assert_eq!(
        report.execution.phases,
        vec![
            BatchPhase::Partitioned,
            BatchPhase::SellsExecuting,
            BatchPhase::BuysExecuting,
            BatchPhase::Persisted,
        ]
    );
    assert_eq!(report.execution.records[0].ticker, "AAPL");
    assert_eq!(report.execution.records[1].ticker, "MSFT");

    let msft = h.store.holding(ACCOUNT, "MSFT").await.unwrap().unwrap();
    assert_eq!(msft.shares, dec!(5));
    assert_eq!(h.store.cash(ACCOUNT).await.unwrap(), dec!(5000) + dec!(1600) - dec!(2000));
}

#[tokio::test]
async fn test_closed_market_defers_every_leg() {
    let store = MemoryStore::new().with_holding(ACCOUNT, holding("AAPL", dec!(10), dec!(150)));
    let h = harness_with(
        dec!(5000),
        &[("AAPL", dec!(150)), ("MSFT", dec!(400))],
        settings(),
        store,
    );
    h.market.set_open(false);

    let batch = json!([
        {"action": "sell", "ticker": "AAPL", "reason": "exit"},
        {"action": "buy", "ticker": "MSFT", "amount_usd": 1500, "reason": "entry"}
    ]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    assert_eq!(report.execution.deferred().count(), 2);
    assert!(report
        .execution
        .records
        .iter()
        .all(|r| r.skip_reason() == Some(&SkipReason::MarketClosed)));
    assert!(h.store.holding(ACCOUNT, "AAPL").await.unwrap().unwrap().is_open());
    assert!(h.store.holding(ACCOUNT, "MSFT").await.unwrap().is_none());
    assert_eq!(h.store.cash(ACCOUNT).await.unwrap(), dec!(5000));

    // Deferrals are journaled too
    assert_eq!(h.store.executions(ACCOUNT).len(), 2);
}

#[tokio::test]
async fn test_missing_price_defers_only_that_leg() {
    let h = harness(dec!(10000), &[("MSFT", dec!(400))]);
    h.market.fail_ticker("NVDA");

    let batch = json!([
        {"action": "buy", "ticker": "NVDA", "amount_usd": 2000, "reason": "ai"},
        {"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "cloud"}
    ]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    let nvda = report.execution.record_for("NVDA").unwrap();
    assert!(matches!(
        nvda.status,
        ExecutionStatus::Deferred {
            reason: SkipReason::PriceUnavailable { .. }
        }
    ));
    assert!(report.execution.record_for("MSFT").unwrap().is_executed());
    assert_eq!(h.store.cash(ACCOUNT).await.unwrap(), dec!(8000));
}

#[tokio::test]
async fn test_buy_below_one_share_and_buffer_breach_are_skipped() {
    let h = harness(dec!(1100), &[("AAPL", dec!(104)), ("BRK", dec!(2000))]);

    let batch = json!([{"action": "buy", "ticker": "BRK", "amount_usd": 1050, "reason": "value"}]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();
    let brk = report.execution.record_for("BRK").unwrap();
    assert_eq!(
        brk.skip_reason(),
        Some(&SkipReason::BelowOneShare {
            price: dec!(2000),
            allocated: dec!(1050),
        })
    );

    // 10 shares at $104 leaves $60, under the $100 buffer
    let batch = json!([{"action": "buy", "ticker": "AAPL", "amount_usd": 1090, "reason": "momentum"}]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();
    let aapl = report.execution.record_for("AAPL").unwrap();
    assert!(matches!(
        aapl.skip_reason(),
        Some(SkipReason::BufferBreach { .. })
    ));
    assert_eq!(h.store.cash(ACCOUNT).await.unwrap(), dec!(1100));
}

#[tokio::test]
async fn test_persistence_failure_isolated_to_its_leg() {
    let h = harness(dec!(10000), &[("MSFT", dec!(400))]);
    h.store
        .fail_holding_writes(Some(StoreError::Unavailable("disk full".into())));

    let batch = json!([
        {"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "cloud"}
    ]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    let msft = report.execution.record_for("MSFT").unwrap();
    assert!(matches!(
        msft.status,
        ExecutionStatus::Deferred {
            reason: SkipReason::PersistenceFailed { .. }
        }
    ));
    assert_eq!(h.store.cash(ACCOUNT).await.unwrap(), dec!(10000));
    assert_eq!(report.execution.buy_spend, Decimal::ZERO);
}

#[tokio::test]
async fn test_corrupt_holding_write_skips_the_leg() {
    let h = harness(dec!(10000), &[("MSFT", dec!(400)), ("AAPL", dec!(150))]);
    h.store
        .fail_holding_writes(Some(StoreError::Corrupt("bad row".into())));

    let batch = json!([
        {"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "cloud"}
    ]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    let msft = report.execution.record_for("MSFT").unwrap();
    assert!(matches!(
        msft.status,
        ExecutionStatus::Skipped {
            reason: SkipReason::PersistenceFailed { .. }
        }
    ));
    assert_eq!(h.store.cash(ACCOUNT).await.unwrap(), dec!(10000));
}

#[tokio::test]
async fn test_live_fill_with_failed_holding_write_still_counts() {
    let mut settings = settings();
    settings.execution.live_orders = true;
    let h = harness_with(dec!(10000), &[("MSFT", dec!(400))], settings, MemoryStore::new());
    h.store
        .fail_holding_writes(Some(StoreError::Unavailable("disk full".into())));

    let batch = json!([
        {"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "cloud"}
    ]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    let msft = report.execution.record_for("MSFT").unwrap();
    match &msft.status {
        ExecutionStatus::Executed {
            shares,
            order_id,
            persist_error,
            ..
        } => {
            assert_eq!(*shares, dec!(5));
            assert!(order_id.is_some());
            assert!(persist_error.as_deref().unwrap().contains("disk full"));
        }
        other => panic!("expected executed, got {:?}", other),
    }
    assert_eq!(h.broker.position_quantity("MSFT"), dec!(5));
    assert_eq!(report.execution.buy_spend, dec!(2000));
    assert_eq!(h.store.cash(ACCOUNT).await.unwrap(), dec!(8000));
    assert_eq!(h.pipeline.ledger(ACCOUNT).snapshot().unsettled_buy_debits, dec!(2000));
}

#[tokio::test]
async fn test_buys_stop_before_crossing_the_cash_buffer() {
    let h = harness(
        dec!(3000),
        &[("AAA", dec!(100)), ("BBB", dec!(250)), ("CCC", dec!(200))],
    );

    let batch = json!([
        {"action": "buy", "ticker": "AAA", "amount_usd": 1000, "reason": "a"},
        {"action": "buy", "ticker": "BBB", "amount_usd": 1000, "reason": "b"},
        {"action": "buy", "ticker": "CCC", "amount_usd": 1000, "reason": "c"}
    ]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    assert!(report.execution.record_for("AAA").unwrap().is_executed());
    assert!(report.execution.record_for("BBB").unwrap().is_executed());
    assert!(matches!(
        report.execution.record_for("CCC").unwrap().status,
        ExecutionStatus::Skipped {
            reason: SkipReason::BufferBreach { .. }
        }
    ));
    let buffer = settings().execution.min_cash_buffer;
    assert!(report.execution.final_cash >= buffer);
    assert_eq!(report.execution.final_cash, dec!(1000));
    assert!(report.execution.buy_spend <= dec!(3000) - buffer);
    assert_eq!(h.store.cash(ACCOUNT).await.unwrap(), dec!(1000));
    assert!(h.store.holding(ACCOUNT, "CCC").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_symbol_skips_instead_of_deferring() {
    let h = harness(dec!(10000), &[("MSFT", dec!(400))]);
    h.market
        .fail_ticker_with("ZZZZ", DataError::SymbolNotFound("ZZZZ".into()));

    let batch = json!([
        {"action": "buy", "ticker": "ZZZZ", "amount_usd": 1000, "reason": "tip"},
        {"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "cloud"}
    ]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    assert!(matches!(
        report.execution.record_for("ZZZZ").unwrap().status,
        ExecutionStatus::Skipped {
            reason: SkipReason::PriceUnavailable { .. }
        }
    ));
    assert!(report.execution.record_for("MSFT").unwrap().is_executed());
}

#[tokio::test]
async fn test_unreachable_broker_aborts_batch() {
    let h = harness(dec!(10000), &[("MSFT", dec!(400))]);
    h.broker
        .set_outage(Some(BrokerError::AuthenticationError("token expired".into())));

    let batch = json!([{"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "x"}]);
    let err = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap_err();

    assert!(matches!(err, PipelineError::BrokerUnreachable { .. }));
    assert!(h.pipeline.ledger(ACCOUNT).is_stale());
    assert!(h.store.executions(ACCOUNT).is_empty());
}

#[tokio::test]
async fn test_other_broker_failure_disables_buys_only() {
    let store = MemoryStore::new().with_holding(ACCOUNT, holding("AAPL", dec!(10), dec!(150)));
    let h = harness_with(
        dec!(10000),
        &[("AAPL", dec!(150)), ("MSFT", dec!(400))],
        settings(),
        store,
    );
    h.broker
        .set_outage(Some(BrokerError::ApiError("500 Internal Server Error".into())));

    let batch = json!([
        {"action": "sell", "ticker": "AAPL", "reason": "exit"},
        {"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "entry"}
    ]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    assert!(report.funds_stale());
    assert!(report.reconcile.is_none());
    assert_eq!(report.validation.rejected.len(), 1);
    assert_eq!(report.validation.rejected[0].reason, RejectionReason::FundsUnavailable);
    assert!(report.execution.record_for("AAPL").unwrap().is_executed());
}

#[tokio::test]
async fn test_unreadable_trade_count_blocks_trades() {
    let store = MemoryStore::new();
    store.fail_trade_counts(Some(StoreError::Unavailable("journal offline".into())));
    let h = harness_with(dec!(10000), &[("MSFT", dec!(400))], settings(), store);

    let batch = json!([{"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "x"}]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    assert!(report.governance.approved.is_empty());
    assert!(matches!(
        report.governance.blocked[0].violation,
        SafetyViolation::TradeCountUnavailable { .. }
    ));
    assert_eq!(report.execution.records.len(), 0);
}

#[tokio::test]
async fn test_daily_cap_counts_executed_trades_across_batches() {
    let mut settings = settings();
    settings.risk.max_daily_trades = 1;
    let h = harness_with(
        dec!(10000),
        &[("MSFT", dec!(400)), ("AAPL", dec!(150))],
        settings,
        MemoryStore::new(),
    );

    let first = json!([{"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "a"}]);
    let report = h.pipeline.run_batch(ACCOUNT, &first).await.unwrap();
    assert_eq!(report.execution.executed().count(), 1);

    let second = json!([{"action": "buy", "ticker": "AAPL", "amount_usd": 1500, "reason": "b"}]);
    let report = h.pipeline.run_batch(ACCOUNT, &second).await.unwrap();
    assert_eq!(report.governance.trades_today, Some(1));
    let violation = &report.governance.blocked[0].violation;
    assert!(violation.to_string().contains("daily trade limit exceeded"));
}
