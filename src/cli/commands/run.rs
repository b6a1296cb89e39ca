//! Run one proposal batch.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tradeguard_broker::{AlpacaMarketData, AlpacaSettings, PaperBroker, PaperMarket};
use tradeguard_config::{load_config, AppConfig};
use tradeguard_core::traits::{HoldingsStore, MarketData, TradeJournal};
use tradeguard_execution::{BatchPipeline, Services};
use tradeguard_monitor::batch_summary;
use tradeguard_store::{JsonFileStore, MemoryStore};

use crate::cli::{OutputFormat, RunArgs};

pub async fn run(args: RunArgs, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let account = args.account.clone().unwrap_or_else(|| config.account.id.clone());

    let text = tokio::fs::read_to_string(&args.proposals)
        .await
        .with_context(|| format!("reading proposals from {}", args.proposals.display()))?;
    let raw: Value = serde_json::from_str(&text).context("proposal file is not JSON")?;

    let paper_market = Arc::new(PaperMarket::new().with_prices(args.prices.clone()));
    paper_market.set_open(!args.market_closed);
    let broker = Arc::new(PaperBroker::new(args.cash, Arc::clone(&paper_market)));
    let market = market_data(&config, paper_market)?;

    let (holdings, journal) = stores(&args, &config).await?;
    if holdings.holdings(&account).await?.is_empty() && holdings.cash(&account).await?.is_zero() {
        info!(%account, cash = %args.cash, "seeding empty account");
        holdings.set_cash(&account, args.cash).await?;
    }

    let pipeline = BatchPipeline::new(
        Services::new(broker, market, holdings, journal),
        config.pipeline_settings(),
    );

    let report = pipeline
        .run_batch(&account, &raw)
        .await
        .with_context(|| format!("batch for account {} aborted", account))?;

    match args.output {
        OutputFormat::Text => println!("{}", batch_summary(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn market_data(config: &AppConfig, paper: Arc<PaperMarket>) -> Result<Arc<dyn MarketData>> {
    if !config.alpaca.use_for_market_data {
        return Ok(paper);
    }
    let settings = AlpacaSettings::from_env(
        &config.alpaca.api_key_env,
        &config.alpaca.api_secret_env,
        config.alpaca.paper,
    )?;
    info!(base_url = settings.base_url(), "quoting from Alpaca");
    Ok(Arc::new(AlpacaMarketData::new(settings)?))
}

async fn stores(
    args: &RunArgs,
    config: &AppConfig,
) -> Result<(Arc<dyn HoldingsStore>, Arc<dyn TradeJournal>)> {
    if args.in_memory {
        let store = Arc::new(MemoryStore::new());
        let holdings: Arc<dyn HoldingsStore> = store.clone();
        let journal: Arc<dyn TradeJournal> = store;
        return Ok((holdings, journal));
    }
    let path = args
        .store
        .clone()
        .unwrap_or_else(|| config.account.store_path.clone().into());
    let store = Arc::new(
        JsonFileStore::open(path.clone())
            .await
            .with_context(|| format!("opening holdings store {}", path.display()))?,
    );
    let holdings: Arc<dyn HoldingsStore> = store.clone();
    let journal: Arc<dyn TradeJournal> = store;
    Ok((holdings, journal))
}
