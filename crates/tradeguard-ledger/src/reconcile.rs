//! Recomputing intraday figures from broker truth.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradeguard_core::types::{OpenOrder, Side, Transaction, TransactionKind};

/// The ledger figures that reconciliation rebuilds from scratch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntradayFigures {
    pub unsettled_sell_proceeds: Decimal,
    pub unsettled_buy_debits: Decimal,
    pub open_order_reserve: Decimal,
    pub fee_reserve: Decimal,
}

impl IntradayFigures {
    /// Build the figures from open orders and today's transactions.
    ///
    /// Pure: the same inputs always yield the same figures.
    pub fn from_broker(open_orders: &[OpenOrder], transactions: &[Transaction]) -> Self {
        let mut figures = IntradayFigures {
            open_order_reserve: open_orders.iter().map(OpenOrder::buy_reserve).sum(),
            ..Default::default()
        };

        for tx in transactions.iter().filter(|tx| tx.kind == TransactionKind::Trade) {
            if let Some(side) = tx.side {
                figures.add_fill(side, tx.amount.abs(), tx.fees);
            }
        }
        figures
    }

    /// Fold one fill into the unsettled buckets.
    pub(crate) fn add_fill(&mut self, side: Side, amount: Decimal, fees: Decimal) {
        let amount = amount.max(Decimal::ZERO);
        let fees = fees.max(Decimal::ZERO);

        match side {
            Side::Sell => {
                self.unsettled_sell_proceeds += (amount - fees).max(Decimal::ZERO);
            }
            Side::Buy => {
                self.unsettled_buy_debits += amount + fees;
            }
        }
        self.fee_reserve += fees;
    }

    /// Field-wise `self - other`.
    pub fn delta(&self, other: &IntradayFigures) -> IntradayFigures {
        IntradayFigures {
            unsettled_sell_proceeds: self.unsettled_sell_proceeds - other.unsettled_sell_proceeds,
            unsettled_buy_debits: self.unsettled_buy_debits - other.unsettled_buy_debits,
            open_order_reserve: self.open_order_reserve - other.open_order_reserve,
            fee_reserve: self.fee_reserve - other.fee_reserve,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == IntradayFigures::default()
    }
}

/// What a reconciliation replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// The incremental estimate before reconciliation
    pub previous: IntradayFigures,
    /// Broker truth now in force
    pub reconciled: IntradayFigures,
    pub open_orders: usize,
    pub trades: usize,
}

impl ReconcileReport {
    /// Broker truth minus the shadow estimate.
    pub fn discrepancy(&self) -> IntradayFigures {
        self.reconciled.delta(&self.previous)
    }

    /// Whether broker truth disagreed with the incremental estimate.
    pub fn has_conflict(&self) -> bool {
        !self.discrepancy().is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tradeguard_core::types::{OrderStatus, OrderType};

    fn trade(id: &str, side: Side, amount: Decimal, fees: Decimal) -> Transaction {
        Transaction {
            id: id.to_string(),
            kind: TransactionKind::Trade,
            side: Some(side),
            ticker: Some("AAPL".to_string()),
            amount,
            fees,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_figures_from_transactions() {
        let txs = vec![
            trade("1", Side::Sell, dec!(1500), dec!(1)),
            trade("2", Side::Buy, dec!(-400), dec!(0.5)),
            Transaction {
                kind: TransactionKind::Dividend,
                side: None,
                ..trade("3", Side::Buy, dec!(25), Decimal::ZERO)
            },
        ];
        let figures = IntradayFigures::from_broker(&[], &txs);

        assert_eq!(figures.unsettled_sell_proceeds, dec!(1499));
        assert_eq!(figures.unsettled_buy_debits, dec!(400.5));
        assert_eq!(figures.fee_reserve, dec!(1.5));
        assert_eq!(figures.open_order_reserve, Decimal::ZERO);
    }

    #[test]
    fn test_figures_from_open_orders() {
        let orders = vec![OpenOrder {
            order_id: "9".to_string(),
            ticker: "MSFT".to_string(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            status: OrderStatus::Accepted,
            quantity: dec!(2),
            limit_price: Some(dec!(300)),
            estimated_price: None,
        }];
        let figures = IntradayFigures::from_broker(&orders, &[]);
        assert_eq!(figures.open_order_reserve, dec!(600));
    }

    #[test]
    fn test_sell_fees_never_make_proceeds_negative() {
        let mut figures = IntradayFigures::default();
        figures.add_fill(Side::Sell, dec!(1), dec!(5));
        assert_eq!(figures.unsettled_sell_proceeds, Decimal::ZERO);
        assert_eq!(figures.fee_reserve, dec!(5));
    }

    #[test]
    fn test_report_conflict() {
        let report = ReconcileReport {
            previous: IntradayFigures::default(),
            reconciled: IntradayFigures {
                unsettled_sell_proceeds: dec!(10),
                ..Default::default()
            },
            open_orders: 0,
            trades: 1,
        };
        assert!(report.has_conflict());
        assert_eq!(report.discrepancy().unsettled_sell_proceeds, dec!(10));
    }
}
