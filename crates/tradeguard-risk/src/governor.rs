//! The risk governor.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use tradeguard_core::traits::TradeJournal;
use tradeguard_core::types::{Action, Holding, PortfolioSnapshot, ValidatedDecision};

use crate::health::PortfolioHealth;
use crate::limits::RiskLimits;
use crate::violation::{ExitSignal, LimitCheck, SafetyViolation};

/// A decision that passed the governor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernedDecision {
    /// Amount already adjusted when the buy was resized
    pub decision: ValidatedDecision,
    /// The amount originally requested, when resized
    pub resized_from: Option<Decimal>,
    #[serde(default)]
    pub exit_signal: Option<ExitSignal>,
}

/// A decision the governor refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedDecision {
    pub decision: ValidatedDecision,
    pub violation: SafetyViolation,
}

/// Everything the governor needs to know about the account.
#[derive(Debug, Clone)]
pub struct ReviewContext<'a> {
    pub account: &'a str,
    pub day: NaiveDate,
    pub portfolio: &'a PortfolioSnapshot,
    /// Cash the governor may spend
    pub cash: Decimal,
    /// Portfolio value the drawdown is measured from
    pub initial_value: Decimal,
    /// Whether approved sells free cash for later buys in the batch
    pub reuse_sale_proceeds: bool,
}

/// Result of reviewing a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorReport {
    pub approved: Vec<GovernedDecision>,
    pub blocked: Vec<BlockedDecision>,
    pub health: PortfolioHealth,
    /// Executed trades already on the books today, when readable
    pub trades_today: Option<u32>,
}

impl GovernorReport {
    /// Approved decisions with resized amounts applied.
    pub fn approved_decisions(&self) -> Vec<ValidatedDecision> {
        self.approved.iter().map(|g| g.decision.clone()).collect()
    }
}

/// Portfolio-wide ceilings applied on top of per-proposal validation.
#[derive(Debug, Clone, Default)]
pub struct RiskGovernor {
    limits: RiskLimits,
}

impl RiskGovernor {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Check one decision against the portfolio limits.
    pub fn validate_trade(
        &self,
        decision: &ValidatedDecision,
        portfolio_value: Decimal,
        cash: Decimal,
        positions: &[Holding],
    ) -> LimitCheck {
        match decision.action {
            Action::Hold => LimitCheck::allowed(),
            Action::Sell => self.validate_sell(decision.ticker(), positions),
            Action::Buy => self.validate_buy(
                decision.ticker(),
                decision.amount_usd,
                portfolio_value,
                cash,
                positions,
            ),
        }
    }

    fn validate_buy(
        &self,
        ticker: &str,
        amount: Decimal,
        portfolio_value: Decimal,
        cash: Decimal,
        positions: &[Holding],
    ) -> LimitCheck {
        let limits = &self.limits;

        if amount <= Decimal::ZERO {
            return LimitCheck::Blocked(SafetyViolation::InvalidAmount { amount });
        }
        if amount < limits.min_trade_value {
            return LimitCheck::Blocked(SafetyViolation::BelowMinimumTrade {
                amount,
                min: limits.min_trade_value,
            });
        }

        let open: Vec<&Holding> = positions.iter().filter(|p| p.is_open()).collect();
        let existing = open
            .iter()
            .find(|p| p.ticker.eq_ignore_ascii_case(ticker))
            .map(|p| p.market_value());
        if existing.is_none() && open.len() >= limits.max_positions {
            return LimitCheck::Blocked(SafetyViolation::MaxPositionsReached {
                count: open.len(),
                max: limits.max_positions,
            });
        }

        let existing_value = existing.unwrap_or(Decimal::ZERO);
        let invested: Decimal = open.iter().map(|p| p.market_value()).sum();

        let mut capacity = (cash - limits.min_cash_buffer).max(Decimal::ZERO);
        if let Some(limit) = limits.position_limit(portfolio_value, cash) {
            capacity = capacity.min((limit - existing_value).max(Decimal::ZERO));
        }
        if portfolio_value > Decimal::ZERO && limits.max_position_pct > Decimal::ZERO {
            let pct_limit = portfolio_value * limits.max_position_pct;
            capacity = capacity.min((pct_limit - existing_value).max(Decimal::ZERO));
        }
        if let Some(limit) = limits.total_investment_limit(portfolio_value, cash) {
            capacity = capacity.min((limit - invested).max(Decimal::ZERO));
        }

        if capacity <= Decimal::ZERO {
            return LimitCheck::Blocked(SafetyViolation::NoCapacity);
        }
        if amount > capacity {
            if capacity < limits.min_trade_value {
                return LimitCheck::Blocked(SafetyViolation::CapacityBelowMinimum {
                    capacity,
                    min: limits.min_trade_value,
                });
            }
            return LimitCheck::Reduced {
                amount: capacity.round_dp(2),
                requested: amount,
            };
        }

        LimitCheck::allowed()
    }

    fn validate_sell(&self, ticker: &str, positions: &[Holding]) -> LimitCheck {
        let Some(position) = positions
            .iter()
            .find(|p| p.is_open() && p.ticker.eq_ignore_ascii_case(ticker))
        else {
            return LimitCheck::Blocked(SafetyViolation::NoPosition {
                ticker: ticker.to_string(),
            });
        };

        if position.market_value() <= Decimal::ZERO {
            return LimitCheck::Blocked(SafetyViolation::EmptyPosition {
                ticker: ticker.to_string(),
            });
        }

        LimitCheck::Allowed {
            exit_signal: self.exit_signal(position),
        }
    }

    /// Take-profit or stop-loss annotation for an open position.
    pub fn exit_signal(&self, position: &Holding) -> Option<ExitSignal> {
        if position.total_cost_basis <= Decimal::ZERO {
            return None;
        }
        let ratio = position.unrealized_pl_ratio();
        if ratio >= self.limits.take_profit_threshold {
            Some(ExitSignal::TakeProfit {
                gain_pct: (ratio * dec!(100)).round_dp(2),
            })
        } else if ratio <= self.limits.stop_loss_threshold {
            Some(ExitSignal::StopLoss {
                loss_pct: (ratio.abs() * dec!(100)).round_dp(2),
            })
        } else {
            None
        }
    }

    /// Block once `executed + already_approved` reaches the daily ceiling.
    ///
    /// A counter that cannot be read blocks as well. Returns the executed
    /// count on success.
    pub async fn check_daily_trade_count<J>(
        &self,
        journal: &J,
        account: &str,
        day: NaiveDate,
        already_approved: u32,
    ) -> Result<u32, SafetyViolation>
    where
        J: TradeJournal + ?Sized,
    {
        let executed = journal
            .executed_trades_on(account, day)
            .await
            .map_err(|e| SafetyViolation::TradeCountUnavailable {
                detail: e.to_string(),
            })?;
        self.daily_limit(executed + already_approved)?;
        Ok(executed)
    }

    fn daily_limit(&self, count: u32) -> Result<(), SafetyViolation> {
        if count >= self.limits.max_daily_trades {
            return Err(SafetyViolation::DailyTradeLimit {
                count,
                max: self.limits.max_daily_trades,
            });
        }
        Ok(())
    }

    /// Portfolio health with this governor's limits.
    pub fn check_portfolio_health(
        &self,
        current_value: Decimal,
        initial_value: Decimal,
        cash: Decimal,
        positions: &[Holding],
    ) -> PortfolioHealth {
        self.limits
            .check_portfolio_health(current_value, initial_value, cash, positions)
    }

    /// Apply every check to an accepted batch, in order.
    ///
    /// While the portfolio is unhealthy every BUY is dropped; SELL and HOLD
    /// pass through to their own checks.
    pub async fn review_batch<J>(
        &self,
        decisions: Vec<ValidatedDecision>,
        ctx: &ReviewContext<'_>,
        journal: &J,
    ) -> GovernorReport
    where
        J: TradeJournal + ?Sized,
    {
        let portfolio_value = ctx.portfolio.total_value();
        let health = self.check_portfolio_health(
            portfolio_value,
            ctx.initial_value,
            ctx.portfolio.cash,
            &ctx.portfolio.holdings,
        );
        if !health.healthy {
            warn!(
                account = ctx.account,
                warnings = ?health.warnings,
                "portfolio unhealthy, kill-switch engaged for buys"
            );
        } else if !health.warnings.is_empty() {
            info!(account = ctx.account, warnings = ?health.warnings, "portfolio health warnings");
        }

        let trades_today = match journal.executed_trades_on(ctx.account, ctx.day).await {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!(account = ctx.account, error = %e, "could not read daily trade count");
                Err(SafetyViolation::TradeCountUnavailable {
                    detail: e.to_string(),
                })
            }
        };

        let mut positions: BTreeMap<String, Holding> = ctx
            .portfolio
            .open_holdings()
            .map(|h| (h.ticker.to_uppercase(), h.clone()))
            .collect();
        let mut cash = ctx.cash;
        let mut approved_trades = 0u32;
        let mut report = GovernorReport {
            approved: Vec::new(),
            blocked: Vec::new(),
            health,
            trades_today: trades_today.as_ref().ok().copied(),
        };

        for mut decision in decisions {
            let held: Vec<Holding> = positions.values().cloned().collect();

            let outcome = if decision.action == Action::Buy && !report.health.healthy {
                Err(SafetyViolation::KillSwitch {
                    warnings: report.health.warnings.clone(),
                })
            } else {
                match self.validate_trade(&decision, portfolio_value, cash, &held) {
                    LimitCheck::Blocked(violation) => Err(violation),
                    LimitCheck::Allowed { exit_signal } => Ok((None, exit_signal)),
                    LimitCheck::Reduced { amount, requested } => {
                        decision.amount_usd = amount;
                        Ok((Some(requested), None))
                    }
                }
            };

            let outcome = outcome.and_then(|checked| {
                if decision.action == Action::Hold || self.exempt_from_daily_cap(&decision, &positions)
                {
                    return Ok(checked);
                }
                let executed = trades_today.clone()?;
                self.daily_limit(executed + approved_trades)?;
                Ok(checked)
            });

            match outcome {
                Ok((resized_from, exit_signal)) => {
                    if let Some(requested) = resized_from {
                        info!(
                            ticker = %decision.ticker(),
                            requested = %requested,
                            amount = %decision.amount_usd,
                            "buy resized to fit risk limits"
                        );
                    }
                    if let Some(signal) = &exit_signal {
                        info!(ticker = %decision.ticker(), %signal, "sell crosses exit threshold");
                    }
                    debug!(action = %decision.action, ticker = %decision.ticker(), "decision approved");

                    match decision.action {
                        Action::Buy => {
                            cash -= decision.amount_usd;
                            approved_trades += 1;
                            // Stand-in so later buys see the new exposure
                            let placeholder = Holding::open(
                                decision.ticker(),
                                Decimal::ONE,
                                decision.amount_usd,
                                decision.amount_usd,
                                "",
                                chrono::Utc::now(),
                            );
                            positions.insert(decision.ticker().to_string(), placeholder);
                        }
                        Action::Sell => {
                            approved_trades += 1;
                            if let Some(sold) = positions.remove(decision.ticker()) {
                                if ctx.reuse_sale_proceeds {
                                    cash += sold.market_value();
                                }
                            }
                        }
                        Action::Hold => {}
                    }

                    report.approved.push(GovernedDecision {
                        decision,
                        resized_from,
                        exit_signal,
                    });
                }
                Err(violation) => {
                    warn!(
                        account = ctx.account,
                        action = %decision.action,
                        ticker = %decision.ticker(),
                        %violation,
                        "safety violation"
                    );
                    report.blocked.push(BlockedDecision { decision, violation });
                }
            }
        }

        info!(
            account = ctx.account,
            approved = report.approved.len(),
            blocked = report.blocked.len(),
            "risk review complete"
        );
        report
    }

    fn exempt_from_daily_cap(
        &self,
        decision: &ValidatedDecision,
        positions: &BTreeMap<String, Holding>,
    ) -> bool {
        self.limits.exempt_profit_taking_sells
            && decision.action == Action::Sell
            && positions
                .get(decision.ticker())
                .is_some_and(|p| p.unrealized_pl > Decimal::ZERO)
    }
}
