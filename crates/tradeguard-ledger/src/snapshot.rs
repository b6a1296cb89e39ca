use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::FundsLedger;

/// Point-in-time view of the ledger for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub settled_cash: Decimal,
    pub unsettled_sell_proceeds: Decimal,
    pub unsettled_buy_debits: Decimal,
    pub open_order_reserve: Decimal,
    pub fee_reserve: Decimal,
    /// Unsettled sale proceeds minus unsettled purchase debits
    pub same_day_net: Decimal,
    pub effective_funds_settled_only: Decimal,
    pub effective_funds_same_day_reuse: Decimal,
    pub last_refresh: Option<DateTime<Utc>>,
    pub stale: bool,
}

impl LedgerSnapshot {
    pub(crate) fn from_ledger(ledger: &FundsLedger) -> Self {
        let state = ledger.state();
        Self {
            settled_cash: state.settled_cash.round_dp(2),
            unsettled_sell_proceeds: state.unsettled_sell_proceeds.round_dp(2),
            unsettled_buy_debits: state.unsettled_buy_debits.round_dp(2),
            open_order_reserve: state.open_order_reserve.round_dp(2),
            fee_reserve: state.fee_reserve.round_dp(2),
            same_day_net: (state.unsettled_sell_proceeds - state.unsettled_buy_debits).round_dp(2),
            effective_funds_settled_only: ledger.effective_funds(false),
            effective_funds_same_day_reuse: ledger.effective_funds(true),
            last_refresh: state.last_refresh,
            stale: ledger.is_stale(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tradeguard_core::types::{Balances, Side};

    #[test]
    fn test_snapshot_rounds_components() {
        let mut ledger = FundsLedger::new();
        ledger.seed(&Balances {
            total_cash: dec!(1000.004),
            ..Default::default()
        });
        ledger.apply_fill(Side::Sell, dec!(100.126), Decimal::ZERO);

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.settled_cash, dec!(1000.00));
        assert_eq!(snapshot.unsettled_sell_proceeds, dec!(100.13));
        assert_eq!(snapshot.effective_funds_settled_only, dec!(1000.00));
        assert_eq!(snapshot.effective_funds_same_day_reuse, dec!(1100.13));
        assert!(!snapshot.stale);
    }

    #[test]
    fn test_snapshot_of_unseeded_ledger_is_stale() {
        let snapshot = FundsLedger::new().snapshot();
        assert!(snapshot.stale);
        assert_eq!(snapshot.last_refresh, None);
    }
}
