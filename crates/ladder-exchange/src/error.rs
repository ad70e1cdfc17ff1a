//! Adapter error types.

use ladder_core::{OrderId, Side};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("Venue unavailable: {0}")]
    Unavailable(String),

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Insufficient {side} balance: required {required}, available {available}")]
    InsufficientBalance {
        side: Side,
        required: Decimal,
        available: Decimal,
    },

    #[error("Unknown order: {0}")]
    UnknownOrder(OrderId),
}

impl AdapterError {
    /// Check if the error is retryable.
    ///
    /// Transport failures are; venue decisions (rejections, balance) are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
