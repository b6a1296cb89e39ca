//! Core types and traits for guarded trade execution.
//!
//! This crate provides the foundational building blocks including:
//! - Holdings, proposals, validated decisions and trade outcomes
//! - Broker-side account types (balances, open orders, transactions, fills)
//! - Execution records written to the trade journal
//! - Collaborator traits for brokers, market data and persistence

pub mod types;
pub mod traits;
pub mod error;

pub use error::{BrokerError, DataError, GuardError, GuardResult, StoreError};
pub use types::*;
pub use traits::*;
