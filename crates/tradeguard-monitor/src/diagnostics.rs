//! Text reports for batches and the funds ledger.

use tradeguard_core::types::{ExecutionRecord, ExecutionStatus};
use tradeguard_execution::BatchReport;
use tradeguard_ledger::LedgerSnapshot;

const RULE: &str = "───────────────────────────────────────────────────────────\n";
const BANNER: &str = "═══════════════════════════════════════════════════════════\n";

/// Human-facing breakdown of the funds ledger.
pub fn ledger_summary(snapshot: &LedgerSnapshot) -> String {
    let mut s = String::new();

    s.push_str("FUNDS LEDGER\n");
    s.push_str(RULE);
    s.push_str(&format!("  Settled Cash:          ${:.2}\n", snapshot.settled_cash));
    s.push_str(&format!("  Open Buy Reserve:     -${:.2}\n", snapshot.open_order_reserve));
    s.push_str(&format!("  Fee Reserve:          -${:.2}\n", snapshot.fee_reserve));
    s.push_str(&format!("  Unsettled Proceeds:    ${:.2}\n", snapshot.unsettled_sell_proceeds));
    s.push_str(&format!("  Unsettled Buys:        ${:.2}\n", snapshot.unsettled_buy_debits));
    s.push_str(&format!("  Same-Day Net:          ${:.2}\n", snapshot.same_day_net));
    s.push_str(&format!(
        "  Effective (settled):   ${:.2}\n",
        snapshot.effective_funds_settled_only
    ));
    s.push_str(&format!(
        "  Effective (same-day):  ${:.2}\n",
        snapshot.effective_funds_same_day_reuse
    ));
    match snapshot.last_refresh {
        Some(at) => s.push_str(&format!("  Last Refresh:          {}\n", at.to_rfc3339())),
        None => s.push_str("  Last Refresh:          never\n"),
    }
    if snapshot.stale {
        s.push_str("  STALE: broker truth unavailable, new buys disabled\n");
    }
    s
}

fn status_text(record: &ExecutionRecord) -> String {
    match &record.status {
        ExecutionStatus::Executed {
            shares,
            price,
            amount,
            persist_error,
            ..
        } => match persist_error {
            Some(e) => format!(
                "executed {} @ ${:.2} (${:.2}), HOLDINGS OUT OF SYNC: {}",
                shares, price, amount, e
            ),
            None => format!("executed {} @ ${:.2} (${:.2})", shares, price, amount),
        },
        ExecutionStatus::Deferred { reason } => format!("deferred: {}", reason),
        ExecutionStatus::Skipped { reason } => format!("skipped: {}", reason),
        ExecutionStatus::Held => "held".to_string(),
    }
}

/// Text summary of one batch.
pub fn batch_summary(report: &BatchReport) -> String {
    let mut s = String::new();

    s.push_str(BANNER);
    s.push_str(&format!("  BATCH REPORT: {}\n", report.account));
    s.push_str(BANNER);
    s.push('\n');

    s.push_str("VALIDATION\n");
    s.push_str(RULE);
    s.push_str(&format!("  Accepted:  {}\n", report.validation.accepted.len()));
    s.push_str(&format!("  Rejected:  {}\n", report.validation.rejected.len()));
    for rejected in &report.validation.rejected {
        let ticker = rejected.normalized_ticker.as_deref().unwrap_or("?");
        s.push_str(&format!("    #{} {}: {}\n", rejected.index, ticker, rejected.reason));
    }
    if !report.validation.unreferenced_holdings.is_empty() {
        s.push_str(&format!(
            "  Not mentioned: {}\n",
            report.validation.unreferenced_holdings.join(", ")
        ));
    }
    s.push('\n');

    s.push_str("RISK REVIEW\n");
    s.push_str(RULE);
    s.push_str(&format!("  Approved:  {}\n", report.governance.approved.len()));
    s.push_str(&format!("  Blocked:   {}\n", report.governance.blocked.len()));
    for blocked in &report.governance.blocked {
        s.push_str(&format!(
            "    {} {}: {}\n",
            blocked.decision.action,
            blocked.decision.ticker(),
            blocked.violation
        ));
    }
    for warning in &report.governance.health.warnings {
        s.push_str(&format!("  Warning: {}\n", warning));
    }
    s.push('\n');

    s.push_str("EXECUTION\n");
    s.push_str(RULE);
    for record in &report.execution.records {
        s.push_str(&format!(
            "  {:<4} {:<6} {}\n",
            record.action.to_string(),
            record.ticker,
            status_text(record)
        ));
    }
    s.push_str(&format!("  Sell Proceeds:  ${:.2}\n", report.execution.sell_proceeds));
    s.push_str(&format!("  Buy Spend:      ${:.2}\n", report.execution.buy_spend));
    s.push_str(&format!(
        "  Cash:           ${:.2} -> ${:.2}\n",
        report.execution.starting_cash, report.execution.final_cash
    ));
    s.push('\n');

    s.push_str(&ledger_summary(&report.ledger));
    s
}
