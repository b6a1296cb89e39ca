//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tradeguard")]
#[command(author, version, about = "Validate, risk-check and execute proposed equity trades")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    /// Also write JSON logs to a daily rolling file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one proposal batch against the paper broker
    Run(RunArgs),
    /// Rebuild the funds ledger from a broker dump
    Ledger(LedgerArgs),
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// JSON file holding the proposal array
    pub proposals: PathBuf,

    /// Account to run against (defaults to account.id from the config)
    #[arg(short, long)]
    pub account: Option<String>,

    /// Settled cash for the paper broker; also seeds the store if it has none
    #[arg(long, default_value = "10000")]
    pub cash: Decimal,

    /// Quote for the paper market, e.g. AAPL=190.25 (repeatable)
    #[arg(short, long = "price", value_parser = parse_price)]
    pub prices: Vec<(String, Decimal)>,

    /// Treat the market as closed
    #[arg(long)]
    pub market_closed: bool,

    /// Holdings store file (defaults to account.store_path from the config)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Keep holdings in memory only
    #[arg(long, conflicts_with = "store")]
    pub in_memory: bool,

    /// Output format
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(clap::Args)]
pub struct LedgerArgs {
    /// JSON file with `balances`, `open_orders` and `transactions`
    pub input: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

fn parse_price(raw: &str) -> Result<(String, Decimal), String> {
    let (ticker, price) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TICKER=PRICE, got '{}'", raw))?;
    let price: Decimal = price
        .trim()
        .parse()
        .map_err(|e| format!("bad price for {}: {}", ticker, e))?;
    if price <= Decimal::ZERO {
        return Err(format!("price for {} must be positive", ticker));
    }
    Ok((ticker.trim().to_uppercase(), price))
}
