//! Portfolio health: drawdown and cash-buffer kill-switch, concentration warnings.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tradeguard_core::types::Holding;

use crate::limits::RiskLimits;

/// Outcome of a portfolio health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHealth {
    pub healthy: bool,
    /// Every finding, blocking or not
    pub warnings: Vec<String>,
}

impl PortfolioHealth {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            warnings: Vec::new(),
        }
    }
}

impl RiskLimits {
    /// Check drawdown, cash buffer and concentration.
    ///
    /// Drawdown and a cash shortfall make the portfolio unhealthy;
    /// concentration only warns.
    pub fn check_portfolio_health(
        &self,
        current_value: Decimal,
        initial_value: Decimal,
        cash: Decimal,
        positions: &[Holding],
    ) -> PortfolioHealth {
        let mut health = PortfolioHealth::healthy();

        if initial_value > Decimal::ZERO {
            let loss = (initial_value - current_value) / initial_value;
            if loss > self.max_drawdown_pct {
                health.healthy = false;
                health.warnings.push(format!(
                    "portfolio loss of {:.1}% exceeds limit of {:.1}%",
                    loss * dec!(100),
                    self.max_drawdown_pct * dec!(100)
                ));
            }
        }

        if cash < self.min_cash_buffer {
            health.healthy = false;
            health.warnings.push(format!(
                "cash balance ${:.2} below minimum buffer ${:.2}",
                cash, self.min_cash_buffer
            ));
        }

        if current_value > Decimal::ZERO {
            for position in positions.iter().filter(|p| p.is_open()) {
                let share = position.market_value() / current_value;
                if share > self.max_position_pct {
                    health.warnings.push(format!(
                        "{} represents {:.1}% of portfolio (max {:.1}%)",
                        position.ticker,
                        share * dec!(100),
                        self.max_position_pct * dec!(100)
                    ));
                }
            }
        }

        health
    }
}
