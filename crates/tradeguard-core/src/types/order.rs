//! Order types as seen through the broker contract.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse a broker instruction such as `BUY`, `SELL_SHORT` or `buy_to_open`.
    ///
    /// Anything beginning with BUY/SELL (case-insensitive) maps to that side.
    pub fn from_instruction(instruction: &str) -> Option<Self> {
        let upper = instruction.trim().to_ascii_uppercase();
        if upper.starts_with("BUY") {
            Some(Side::Buy)
        } else if upper.starts_with("SELL") {
            Some(Side::Sell)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Market order - execute immediately at best available price
    Market,
    /// Limit order - execute at specified price or better
    Limit,
    /// Stop order - becomes market order when stop price is reached
    Stop,
    /// Stop-limit order - becomes limit order when stop price is reached
    StopLimit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Stop => write!(f, "STOP"),
            OrderType::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order created but not yet routed
    Pending,
    /// Order submitted to broker
    Submitted,
    /// Order accepted by broker/exchange
    Accepted,
    /// Order partially filled
    PartiallyFilled,
    /// Order completely filled
    Filled,
    /// Order canceled
    Canceled,
    /// Order rejected
    Rejected,
    /// Order expired
    Expired,
}

impl OrderStatus {
    /// Check if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// Check if the order is active (can still be filled, so still holds funds).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// Broker acknowledgement of a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub status: OrderStatus,
}

impl OrderAck {
    /// Whether the broker took the order (it may still be working).
    pub fn is_accepted(&self) -> bool {
        !matches!(self.status, OrderStatus::Rejected | OrderStatus::Canceled | OrderStatus::Expired)
    }
}

/// An order still working at the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: String,
    pub ticker: String,
    pub side: Side,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub quantity: Decimal,
    /// Limit price for limit and stop-limit orders
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Broker estimate used to price market orders
    #[serde(default)]
    pub estimated_price: Option<Decimal>,
}

impl OpenOrder {
    /// Funds this order keeps reserved.
    ///
    /// Only active BUY orders reserve cash. Market orders fall back to the
    /// broker's estimated price; orders without a usable price reserve nothing.
    pub fn buy_reserve(&self) -> Decimal {
        if !self.status.is_active() || self.side != Side::Buy || self.quantity <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let price = match self.limit_price {
            Some(p) if p > Decimal::ZERO => p,
            _ if self.order_type == OrderType::Market => {
                self.estimated_price.unwrap_or(Decimal::ZERO)
            }
            _ => Decimal::ZERO,
        };

        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(side: Side, order_type: OrderType, status: OrderStatus) -> OpenOrder {
        OpenOrder {
            order_id: "1".to_string(),
            ticker: "AAPL".to_string(),
            side,
            order_type,
            status,
            quantity: dec!(10),
            limit_price: None,
            estimated_price: None,
        }
    }

    #[test]
    fn test_side_from_instruction() {
        assert_eq!(Side::from_instruction("buy_to_open"), Some(Side::Buy));
        assert_eq!(Side::from_instruction(" SELL_SHORT"), Some(Side::Sell));
        assert_eq!(Side::from_instruction("exchange"), None);
    }

    #[test]
    fn test_limit_buy_reserves_funds() {
        let mut o = order(Side::Buy, OrderType::Limit, OrderStatus::Accepted);
        o.limit_price = Some(dec!(150.00));
        assert_eq!(o.buy_reserve(), dec!(1500.00));
    }

    #[test]
    fn test_market_buy_uses_estimate() {
        let mut o = order(Side::Buy, OrderType::Market, OrderStatus::Submitted);
        assert_eq!(o.buy_reserve(), Decimal::ZERO);
        o.estimated_price = Some(dec!(20));
        assert_eq!(o.buy_reserve(), dec!(200));
    }

    #[test]
    fn test_sells_and_terminal_orders_reserve_nothing() {
        let mut sell = order(Side::Sell, OrderType::Limit, OrderStatus::Accepted);
        sell.limit_price = Some(dec!(10));
        assert_eq!(sell.buy_reserve(), Decimal::ZERO);

        let mut filled = order(Side::Buy, OrderType::Limit, OrderStatus::Filled);
        filled.limit_price = Some(dec!(10));
        assert_eq!(filled.buy_reserve(), Decimal::ZERO);
    }
}
