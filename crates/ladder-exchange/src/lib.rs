//! Execution venue boundary for the ladder market maker.
//!
//! - `ExchangeAdapter`: the six-operation contract the engine drives
//! - `PaperExchange`: in-memory venue with matching, balances, and fault injection

pub mod adapter;
pub mod error;
pub mod paper;

pub use adapter::{BoxFuture, DynExchange, ExchangeAdapter};
pub use error::{AdapterError, AdapterResult};
pub use paper::{PaperConfig, PaperExchange, Placement};
