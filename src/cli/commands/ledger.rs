//! Rebuild the funds ledger from a broker dump.

use anyhow::{Context, Result};
use serde::Deserialize;
use tradeguard_core::types::{Balances, OpenOrder, Transaction};
use tradeguard_ledger::FundsLedger;
use tradeguard_monitor::ledger_summary;

use crate::cli::{LedgerArgs, OutputFormat};

#[derive(Debug, Deserialize)]
struct BrokerDump {
    balances: Balances,
    #[serde(default)]
    open_orders: Vec<OpenOrder>,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

pub async fn run(args: LedgerArgs) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("reading broker dump from {}", args.input.display()))?;
    let dump: BrokerDump = serde_json::from_str(&text).context("malformed broker dump")?;

    let mut ledger = FundsLedger::new();
    ledger.seed(&dump.balances);
    let report = ledger.reconcile(&dump.open_orders, &dump.transactions);
    let snapshot = ledger.snapshot();

    match args.output {
        OutputFormat::Text => {
            println!("{}", ledger_summary(&snapshot));
            println!(
                "Reconciled {} open orders and {} transactions",
                report.open_orders, report.trades
            );
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
    }
    Ok(())
}
