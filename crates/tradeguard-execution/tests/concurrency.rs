mod common;

use common::{harness, harness_with, holding, settings, two_broker_harness, ACCOUNT, SECOND};
use futures::StreamExt;
use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;
use tradeguard_core::traits::HoldingsStore;
use tradeguard_ledger::drain_fill_stream;
use tradeguard_store::MemoryStore;
use tradeguard_validator::RejectionReason;

#[tokio::test]
async fn test_batches_for_one_account_serialize() {
    let h = harness(dec!(10000), &[("AAPL", dec!(150))]);
    // Slow quotes widen the window in which unserialized batches would overlap
    h.market.set_latency(Some(Duration::from_millis(50)));

    let batch = json!([{"action": "buy", "ticker": "AAPL", "amount_usd": 1500, "reason": "dip"}]);
    let (first, second) = tokio::join!(
        h.pipeline.run_batch(ACCOUNT, &batch),
        h.pipeline.run_batch(ACCOUNT, &batch)
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    let executed = first.execution.executed().count() + second.execution.executed().count();
    assert_eq!(executed, 1);

    let rejected: Vec<_> = first
        .validation
        .rejected
        .iter()
        .chain(second.validation.rejected.iter())
        .collect();
    assert_eq!(rejected.len(), 1);
    assert!(matches!(rejected[0].reason, RejectionReason::AlreadyHeld { .. }));

    let aapl = h.store.holding(ACCOUNT, "AAPL").await.unwrap().unwrap();
    assert_eq!(aapl.shares, dec!(10));
}

#[tokio::test]
async fn test_different_accounts_are_independent() {
    let h = harness(dec!(10000), &[("AAPL", dec!(150))]);
    h.store.set_cash("second", dec!(10000)).await.unwrap();

    let batch = json!([{"action": "buy", "ticker": "AAPL", "amount_usd": 1500, "reason": "dip"}]);
    let (first, second) = tokio::join!(
        h.pipeline.run_batch(ACCOUNT, &batch),
        h.pipeline.run_batch("second", &batch)
    );

    assert_eq!(first.unwrap().execution.executed().count(), 1);
    assert_eq!(second.unwrap().execution.executed().count(), 1);
    assert!(h.store.holding("second", "AAPL").await.unwrap().is_some());
}

#[tokio::test]
async fn test_live_fills_stay_in_their_own_account_ledger() {
    let mut settings = settings();
    settings.execution.live_orders = true;
    let (h, second) = two_broker_harness(dec!(10000), &[("MSFT", dec!(400))], settings);

    let buy = json!([{"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "cloud"}]);
    let report = h.pipeline.run_batch(ACCOUNT, &buy).await.unwrap();
    assert_eq!(report.execution.executed().count(), 1);
    assert_eq!(h.broker.position_quantity("MSFT"), dec!(5));
    assert_eq!(second.position_quantity("MSFT"), dec!(0));

    let empty = json!([]);
    let report = h.pipeline.run_batch(SECOND, &empty).await.unwrap();
    assert_eq!(report.ledger.unsettled_buy_debits, dec!(0));
    assert_eq!(report.ledger.effective_funds_settled_only, dec!(10000));

    let report = h.pipeline.run_batch(ACCOUNT, &empty).await.unwrap();
    assert_eq!(report.ledger.unsettled_buy_debits, dec!(2000));
    assert_eq!(report.ledger.effective_funds_settled_only, dec!(8000));
}

#[tokio::test]
async fn test_cooldown_runs_between_sells_and_buys() {
    let mut settings = settings();
    settings.execution.cooldown_secs = 1;
    let store = MemoryStore::new().with_holding(ACCOUNT, holding("AAPL", dec!(10), dec!(150)));
    let h = harness_with(
        dec!(5000),
        &[("AAPL", dec!(150)), ("MSFT", dec!(400))],
        settings,
        store,
    );

    let batch = json!([
        {"action": "sell", "ticker": "AAPL", "reason": "rotate"},
        {"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "rotate"}
    ]);

    let started = std::time::Instant::now();
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    assert!(report
        .execution
        .phases
        .contains(&tradeguard_execution::BatchPhase::CooldownWait));
    assert_eq!(report.execution.executed().count(), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_live_orders_reach_the_broker_and_fills_are_not_double_counted() {
    let mut settings = settings();
    settings.execution.live_orders = true;
    let h = harness_with(dec!(10000), &[("MSFT", dec!(400))], settings, MemoryStore::new());
    let fills = h.broker.subscribe_fills();

    let batch = json!([{"action": "buy", "ticker": "MSFT", "amount_usd": 2000, "reason": "cloud"}]);
    let report = h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();

    let msft = report.execution.record_for("MSFT").unwrap();
    assert!(matches!(
        &msft.status,
        tradeguard_core::types::ExecutionStatus::Executed { order_id: Some(_), .. }
    ));
    assert_eq!(h.broker.position_quantity("MSFT"), dec!(5));

    // The next batch reconciles against the broker's booked transaction
    let empty = json!([]);
    let report = h.pipeline.run_batch(ACCOUNT, &empty).await.unwrap();
    assert_eq!(report.ledger.unsettled_buy_debits, dec!(2000));
    assert_eq!(report.ledger.effective_funds_settled_only, dec!(8000));

    // A late copy of the same fill is ignored after reconciliation
    let stats = drain_fill_stream(h.pipeline.ledger(ACCOUNT), fills.take(1)).await;
    assert_eq!(stats.applied, 0);
    assert_eq!(stats.ignored, 1);
    assert_eq!(
        h.pipeline.ledger(ACCOUNT).snapshot().effective_funds_settled_only,
        dec!(8000)
    );
}

#[tokio::test]
async fn test_released_account_is_reseeded_from_the_broker() {
    let h = harness(dec!(10000), &[("AAPL", dec!(150))]);
    let batch = json!([{"action": "buy", "ticker": "AAPL", "amount_usd": 1500, "reason": "dip"}]);
    h.pipeline.run_batch(ACCOUNT, &batch).await.unwrap();
    h.pipeline.ledger(ACCOUNT).mark_stale();

    assert!(h.pipeline.release_account(ACCOUNT));
    assert!(h.pipeline.ledger(ACCOUNT).snapshot().last_refresh.is_none());

    let report = h.pipeline.run_batch(ACCOUNT, &json!([])).await.unwrap();
    assert!(!report.ledger.stale);
    assert!(report.ledger.last_refresh.is_some());
}

#[tokio::test]
async fn test_busy_account_is_not_released() {
    let h = harness(dec!(10000), &[("AAPL", dec!(150))]);
    h.market.set_latency(Some(Duration::from_millis(100)));
    let batch = json!([{"action": "buy", "ticker": "AAPL", "amount_usd": 1500, "reason": "dip"}]);

    let (report, released) = tokio::join!(h.pipeline.run_batch(ACCOUNT, &batch), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.pipeline.release_account(ACCOUNT)
    });

    assert!(!released);
    assert_eq!(report.unwrap().execution.executed().count(), 1);
}
