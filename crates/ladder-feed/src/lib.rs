//! Reference price feed for the ladder market maker.
//!
//! The engine re-anchors its quotes to an external price. This crate
//! provides the trait it consumes, a Binance REST implementation, and a
//! scripted mock for tests.

pub mod binance;
pub mod error;
pub mod feed;

pub use binance::{parse_ticker_price, BinancePriceFeed, DEFAULT_BASE_URL};
pub use error::{FeedError, FeedResult};
pub use feed::{
    normalize_ticker, reference_symbol, BoxFuture, DynPriceFeed, MockPriceFeed,
    ReferencePriceFeed,
};
