//! Guarded trade execution CLI.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tradeguard_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level {
        cli::LogLevel::Trace => "trace",
        cli::LogLevel::Debug => "debug",
        cli::LogLevel::Info => "info",
        cli::LogLevel::Warn => "warn",
        cli::LogLevel::Error => "error",
    };
    // Dropping the guard flushes the file writer, so it lives until exit.
    let _log_guard = setup_logging(log_level, cli.json_logs, cli.log_file.as_deref());

    match cli.command {
        Commands::Run(args) => cli::commands::run::run(args, &cli.config).await,
        Commands::Ledger(args) => cli::commands::ledger::run(args).await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config).await,
    }
}
