//! Core domain types for the ladder market maker.
//!
//! This crate provides fundamental types used throughout the system:
//! - `Price`, `Size`: Precision-safe numeric types normalized to 8 decimals
//! - `Side`, `OpenOrder`, `BookLevel`, `LadderLevel`: Book and order snapshots
//! - `retry`: Bounded retry combinator shared by every venue-facing call site

pub mod decimal;
pub mod error;
pub mod order;
pub mod retry;

pub use decimal::{parse_amount, parse_decimal, Price, Size, PRICE_DP, QTY_DP};
pub use error::{CoreError, Result};
pub use order::{BookLevel, LadderLevel, OpenOrder, OrderId, Side};
pub use retry::{retry, Backoff, RetryPolicy};
