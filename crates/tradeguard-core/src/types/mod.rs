//! Core data types.

mod account;
mod holding;
mod journal;
mod order;
mod outcome;
mod proposal;

pub use account::{
    AccountSnapshot, Balances, BrokerPosition, FillEvent, SettlementMode, Transaction,
    TransactionKind,
};
pub use holding::{Holding, PortfolioSnapshot};
pub use journal::{ExecutionRecord, ExecutionStatus, SkipReason};
pub use order::{OpenOrder, OrderAck, OrderStatus, OrderType, Side};
pub use outcome::{
    OutcomeCategory, TradeOutcome, BREAK_EVEN_FLOOR, SIGNIFICANT_LOSS_THRESHOLD,
    SIGNIFICANT_PROFIT_THRESHOLD,
};
pub use proposal::{Action, TradeProposal, ValidatedDecision};
