//! Configuration management.
//!
//! A TOML file layered with `TRADEGUARD__`-prefixed environment overrides,
//! e.g. `TRADEGUARD__RISK__MAX_DAILY_TRADES=5`.

mod settings;

pub use settings::{AccountConfig, AlpacaConfig, AppConfig, AppSettings, LoggingConfig};

use config::{Config, Environment, File};
use rust_decimal::Decimal;
use std::path::Path;
use thiserror::Error;

/// Configuration loading or validation failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Load configuration from file and environment, then validate it.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("TRADEGUARD")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app: AppConfig = config.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Parse configuration from a TOML string, without environment overrides.
pub fn parse_config(toml_text: &str) -> Result<AppConfig, ConfigError> {
    let app: AppConfig =
        toml::from_str(toml_text).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    app.validate()?;
    Ok(app)
}

impl AppConfig {
    /// Check constraints that span fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.validator.min_buy <= Decimal::ZERO {
            return invalid(format!("validator.min_buy must be positive, got {}", self.validator.min_buy));
        }
        if self.validator.min_buy > self.validator.max_buy {
            return invalid(format!(
                "validator.min_buy ({}) exceeds validator.max_buy ({})",
                self.validator.min_buy, self.validator.max_buy
            ));
        }
        if self.risk.min_cash_buffer < Decimal::ZERO {
            return invalid("risk.min_cash_buffer must not be negative".to_string());
        }
        if self.execution.min_cash_buffer < Decimal::ZERO {
            return invalid("execution.min_cash_buffer must not be negative".to_string());
        }
        if self.risk.max_position_pct < Decimal::ZERO || self.risk.max_position_pct > Decimal::ONE {
            return invalid(format!(
                "risk.max_position_pct must be a fraction between 0 and 1, got {}",
                self.risk.max_position_pct
            ));
        }
        if self.risk.max_drawdown_pct <= Decimal::ZERO || self.risk.max_drawdown_pct > Decimal::ONE {
            return invalid(format!(
                "risk.max_drawdown_pct must be a fraction in (0, 1], got {}",
                self.risk.max_drawdown_pct
            ));
        }
        if self.risk.max_daily_trades == 0 {
            return invalid("risk.max_daily_trades must be at least 1".to_string());
        }
        if self.execution.price_timeout_ms == 0 || self.execution.broker_timeout_ms == 0 {
            return invalid("execution timeouts must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tradeguard_core::types::SettlementMode;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.account.default_policy.settlement_mode, SettlementMode::SettledOnly);
        assert!(!config.risk.exempt_profit_taking_sells);
    }

    #[test]
    fn test_partial_file_keeps_section_defaults() {
        let config = parse_config(
            r#"
            [validator]
            min_buy = 500
            max_buy = 2500

            [risk]
            max_daily_trades = 4

            [account.default_policy]
            settlement_mode = "same_day_reuse"
            "#,
        )
        .unwrap();

        assert_eq!(config.validator.max_buy, dec!(2500));
        assert_eq!(config.risk.max_daily_trades, 4);
        assert_eq!(config.risk.max_positions, 10);
        assert_eq!(config.execution.cooldown_secs, 30);
        assert!(config.pipeline_settings().policy("anyone").settlement_mode.allow_unsettled());
    }

    #[test]
    fn test_inverted_buy_limits_rejected() {
        let err = parse_config(
            r#"
            [validator]
            min_buy = 5000
            max_buy = 1000
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds validator.max_buy"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[app]\nname = \"override-check\"\nenvironment = \"test\"\n\n[execution]\nlive_orders = true"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.app.name, "override-check");
        assert!(config.execution.live_orders);
    }
}
