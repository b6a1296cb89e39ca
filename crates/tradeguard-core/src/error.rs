//! Error types shared by the guard crates.
//!
//! Collaborator errors distinguish transient failures (worth retrying on a
//! later cycle, degrade to a skip) from terminal ones (the caller should not
//! expect a retry to help).

use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Market data error: {0}")]
    Data(#[from] DataError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Broker-specific errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Market closed")]
    MarketClosed,

    #[error("API error: {0}")]
    ApiError(String),
}

impl BrokerError {
    /// Whether a later attempt could succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::Connection(_)
                | BrokerError::Timeout(_)
                | BrokerError::RateLimited { .. }
                | BrokerError::MarketClosed
        )
    }

    /// Whether the broker cannot be reached or will not talk to us at all.
    ///
    /// These are the only failures that abort a whole batch: without broker
    /// truth no safe funds figure can be produced.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            BrokerError::Connection(_)
                | BrokerError::AuthenticationError(_)
                | BrokerError::Timeout(_)
        )
    }
}

/// Market data errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl DataError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::Timeout(_) | DataError::ConnectionError(_) | DataError::RateLimited
        )
    }
}

/// Persistence errors from the holdings store or trade journal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write conflict on {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(e: serde_json::Error) -> Self {
        GuardError::Serialization(e.to_string())
    }
}

/// Result type alias for guard operations.
pub type GuardResult<T> = Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_broker_errors() {
        assert!(BrokerError::AuthenticationError("expired".into()).is_unreachable());
        assert!(BrokerError::Timeout(5000).is_unreachable());
        assert!(!BrokerError::ApiError("bad request".into()).is_unreachable());
        assert!(!BrokerError::OrderRejected("halted".into()).is_transient());
    }

    #[test]
    fn test_store_error_transience() {
        assert!(StoreError::Unavailable("disk".into()).is_transient());
        assert!(!StoreError::Corrupt("cash row".into()).is_transient());
    }
}
