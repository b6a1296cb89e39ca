//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use tradeguard_config::load_config;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    match load_config(config_path) {
        Ok(config) => {
            println!("Configuration is valid!");
            println!();
            println!("App: {}", config.app.name);
            println!("Environment: {}", config.app.environment);
            println!("Log level: {}", config.logging.level);
            println!("Default account: {}", config.account.id);
            println!("Settlement mode: {:?}", config.account.default_policy.settlement_mode);
            println!("Buy range: ${} - ${}", config.validator.min_buy, config.validator.max_buy);
            println!("Max position value: ${}", config.risk.max_position_value);
            println!("Max positions: {}", config.risk.max_positions);
            println!("Max daily trades: {}", config.risk.max_daily_trades);
            println!("Live orders: {}", config.execution.live_orders);
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
