//! Configuration structures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tradeguard_execution::{AccountPolicy, ExecutionSettings, PipelineSettings};
use tradeguard_risk::RiskLimits;
use tradeguard_validator::BuyLimits;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub validator: BuyLimits,
    #[serde(default)]
    pub risk: RiskLimits,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub alpaca: AlpacaConfig,
}

impl AppConfig {
    /// Settings for the batch pipeline.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            buy_limits: self.validator.clone(),
            risk: self.risk.clone(),
            execution: self.execution.clone(),
            default_account: self.account.default_policy.clone(),
            accounts: self.account.overrides.clone(),
        }
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "tradeguard".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Daily rolling log file, in addition to stdout
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Which account batches run against, and how each account settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Account used when a command names none
    pub id: String,
    /// Where the JSON holdings store lives
    pub store_path: String,
    /// Policy for accounts without an override
    pub default_policy: AccountPolicy,
    /// Per-account policy overrides, keyed by account id
    pub overrides: BTreeMap<String, AccountPolicy>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            store_path: "data/holdings.json".to_string(),
            default_policy: AccountPolicy::default(),
            overrides: BTreeMap::new(),
        }
    }
}

/// Alpaca API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    pub api_key_env: String,
    pub api_secret_env: String,
    pub paper: bool,
    /// Quote from Alpaca instead of the paper market
    pub use_for_market_data: bool,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            api_key_env: "ALPACA_API_KEY".to_string(),
            api_secret_env: "ALPACA_API_SECRET".to_string(),
            paper: true,
            use_for_market_data: false,
        }
    }
}
