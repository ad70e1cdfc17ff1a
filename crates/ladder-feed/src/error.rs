//! Feed error types.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse price response: {0}")]
    Parse(String),

    #[error("Price for {symbol} unavailable after {attempts} attempts: {last}")]
    Exhausted {
        symbol: String,
        attempts: u32,
        last: String,
    },

    #[error("No price available for {0}")]
    Unavailable(String),
}

impl FeedError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Client errors other than rate limiting (e.g. an unknown symbol) are
    /// permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::HttpClient(_) | Self::Parse(_) | Self::Unavailable(_) => true,
            Self::Exhausted { .. } => false,
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FeedError::HttpClient("timeout".into()).is_retryable());
        assert!(FeedError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(FeedError::Status {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(!FeedError::Status {
            status: 400,
            body: "Invalid symbol.".into()
        }
        .is_retryable());
    }
}
