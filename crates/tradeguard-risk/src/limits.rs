//! Portfolio-level risk limits.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Portfolio-level limits configuration.
///
/// Fractions are plain ratios (0.20 == 20%). A fractional limit of zero is
/// disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Absolute floor for the value of a single position
    pub max_position_value: Decimal,
    /// Per-position limit as a fraction of account value
    pub max_position_fraction: Decimal,
    /// Absolute floor for the total invested value
    pub max_total_investment: Decimal,
    /// Total invested limit as a fraction of account value
    pub max_total_investment_fraction: Decimal,
    /// Cash that must stay uninvested
    pub min_cash_buffer: Decimal,
    /// Maximum single position as a fraction of portfolio value
    pub max_position_pct: Decimal,
    /// Smallest buy worth placing
    pub min_trade_value: Decimal,
    /// Maximum number of distinct open positions
    pub max_positions: usize,
    /// Executed trades allowed per calendar day
    pub max_daily_trades: u32,
    /// Drawdown from the initial value that makes the portfolio unhealthy
    pub max_drawdown_pct: Decimal,
    /// Unrealized loss ratio that marks a sell as a stop-loss
    pub stop_loss_threshold: Decimal,
    /// Unrealized gain ratio that marks a sell as taking profit
    pub take_profit_threshold: Decimal,
    /// Let sells of profitable positions bypass the daily trade ceiling
    pub exempt_profit_taking_sells: bool,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_value: dec!(1000),
            max_position_fraction: Decimal::ZERO,
            max_total_investment: dec!(10000),
            max_total_investment_fraction: Decimal::ZERO,
            min_cash_buffer: dec!(500),
            max_position_pct: dec!(0.20),
            min_trade_value: dec!(50),
            max_positions: 10,
            max_daily_trades: 10,
            max_drawdown_pct: dec!(0.15),
            stop_loss_threshold: dec!(-0.03),
            take_profit_threshold: dec!(0.05),
            exempt_profit_taking_sells: false,
        }
    }
}

impl RiskLimits {
    /// Account value used for fractional limits, falling back to cash when
    /// the portfolio value is unknown.
    pub fn account_value(&self, portfolio_value: Decimal, cash: Decimal) -> Decimal {
        if portfolio_value > Decimal::ZERO {
            portfolio_value
        } else {
            cash.max(Decimal::ZERO)
        }
    }

    /// Active per-position ceiling; `None` when no limit is configured.
    pub fn position_limit(&self, portfolio_value: Decimal, cash: Decimal) -> Option<Decimal> {
        self.combined_limit(
            self.max_position_value,
            self.max_position_fraction,
            portfolio_value,
            cash,
        )
    }

    /// Active total-investment ceiling; `None` when no limit is configured.
    pub fn total_investment_limit(
        &self,
        portfolio_value: Decimal,
        cash: Decimal,
    ) -> Option<Decimal> {
        self.combined_limit(
            self.max_total_investment,
            self.max_total_investment_fraction,
            portfolio_value,
            cash,
        )
    }

    /// The larger of an absolute floor and a fraction of account value.
    fn combined_limit(
        &self,
        floor: Decimal,
        fraction: Decimal,
        portfolio_value: Decimal,
        cash: Decimal,
    ) -> Option<Decimal> {
        let account_value = self.account_value(portfolio_value, cash);
        let absolute = (floor > Decimal::ZERO).then_some(floor);
        let relative = (fraction > Decimal::ZERO && account_value > Decimal::ZERO)
            .then(|| account_value * fraction);

        match (absolute, relative) {
            (Some(a), Some(r)) => Some(a.max(r)),
            (a, r) => a.or(r),
        }
    }
}
