use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tradeguard_core::types::SettlementMode;

/// Execution timing and cash floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Pause between the sell and buy phases when both have work
    pub cooldown_secs: u64,
    /// Bound on each price or market-clock request
    pub price_timeout_ms: u64,
    /// Bound on each broker request
    pub broker_timeout_ms: u64,
    /// Cash that must remain after every buy
    pub min_cash_buffer: Decimal,
    /// Place real orders through the broker instead of only mirroring
    pub live_orders: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 30,
            price_timeout_ms: 5_000,
            broker_timeout_ms: 10_000,
            min_cash_buffer: dec!(100),
            live_orders: false,
        }
    }
}

impl ExecutionSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn price_timeout(&self) -> Duration {
        Duration::from_millis(self.price_timeout_ms)
    }

    pub fn broker_timeout(&self) -> Duration {
        Duration::from_millis(self.broker_timeout_ms)
    }
}

/// Per-account policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountPolicy {
    pub settlement_mode: SettlementMode,
    /// Portfolio value drawdown is measured from; zero measures from the
    /// value at the start of each batch
    pub initial_value: Decimal,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            settlement_mode: SettlementMode::SettledOnly,
            initial_value: Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: ExecutionSettings =
            serde_json::from_str(r#"{"cooldown_secs": 0, "live_orders": true}"#).unwrap();
        assert_eq!(settings.cooldown(), Duration::ZERO);
        assert!(settings.live_orders);
        assert_eq!(settings.min_cash_buffer, dec!(100));
        assert_eq!(settings.price_timeout(), Duration::from_secs(5));
    }
}
