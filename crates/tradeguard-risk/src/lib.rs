//! Risk governance for validated trade decisions.
//!
//! Provides portfolio limits, the daily trade ceiling, portfolio health and
//! the kill-switch that halts buys while the portfolio is unhealthy.

mod governor;
mod health;
mod limits;
mod violation;

pub use governor::{BlockedDecision, GovernedDecision, GovernorReport, ReviewContext, RiskGovernor};
pub use health::PortfolioHealth;
pub use limits::RiskLimits;
pub use violation::{ExitSignal, LimitCheck, SafetyViolation};
