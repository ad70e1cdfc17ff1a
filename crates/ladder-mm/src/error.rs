//! Engine error types.

use ladder_core::{Price, Side};
use ladder_exchange::AdapterError;
use ladder_feed::FeedError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Reference price unavailable: {0}")]
    Feed(#[from] FeedError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Bait order failed on {side} at {price}: {reason}")]
    BaitFailed {
        side: Side,
        price: Price,
        reason: String,
    },

    #[error("Insufficient {side} balance: required {required}, available {available}")]
    InsufficientBalance {
        side: Side,
        required: Decimal,
        available: Decimal,
    },

    #[error("Book consistency error: {0}")]
    Consistency(String),
}

impl EngineError {
    /// Errors that must stop the engine run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Consistency(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::Config("levels".into()).is_fatal());
        assert!(EngineError::Consistency("2 orders remain".into()).is_fatal());
        assert!(!EngineError::Feed(FeedError::Unavailable("BTCUSDT".into())).is_fatal());
        assert!(!EngineError::BaitFailed {
            side: Side::Ask,
            price: Price::new(dec!(100)),
            reason: "timeout".into(),
        }
        .is_fatal());
    }
}
