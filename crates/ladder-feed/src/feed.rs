//! Reference price feed trait.
//!
//! The engine only needs "give me the current price for this symbol". The
//! trait keeps the transport swappable and lets tests script prices.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ladder_core::Price;
use parking_lot::Mutex;

use crate::error::{FeedError, FeedResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of the external reference price.
///
/// Implementations retry internally and only return an error once their
/// own attempt budget is spent.
pub trait ReferencePriceFeed: Send + Sync {
    /// Current price for `symbol` (e.g. `"BTCUSDT"`).
    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, FeedResult<Price>>;
}

/// Arc wrapper for feed trait objects.
pub type DynPriceFeed = Arc<dyn ReferencePriceFeed>;

/// Normalize an operator-entered ticker: trimmed, upper-cased, without a
/// trailing `USDT` quote suffix.
pub fn normalize_ticker(ticker: &str) -> String {
    let t = ticker.trim().to_uppercase();
    match t.strip_suffix("USDT") {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => t,
    }
}

/// Reference-venue symbol for a ticker quoted in USDT.
pub fn reference_symbol(ticker: &str) -> String {
    format!("{}USDT", normalize_ticker(ticker))
}

/// Scripted feed for tests and dry runs.
///
/// Queued results are returned first, in order. Once the queue is empty
/// the last successfully returned price repeats.
#[derive(Debug, Default)]
pub struct MockPriceFeed {
    queued: Mutex<VecDeque<FeedResult<Price>>>,
    last: Mutex<Option<Price>>,
    calls: AtomicUsize,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed that always returns `price`.
    pub fn constant(price: Price) -> Self {
        let feed = Self::new();
        *feed.last.lock() = Some(price);
        feed
    }

    /// Queue a price to be returned by a future call.
    pub fn push_price(&self, price: Price) {
        self.queued.lock().push_back(Ok(price));
    }

    /// Queue a failure to be returned by a future call.
    pub fn push_error(&self, error: FeedError) {
        self.queued.lock().push_back(Err(error));
    }

    /// Number of `get_price` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self, symbol: &str) -> FeedResult<Price> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.queued.lock().pop_front() {
            if let Ok(price) = &result {
                *self.last.lock() = Some(*price);
            }
            return result;
        }
        (*self.last.lock()).ok_or_else(|| FeedError::Unavailable(symbol.to_string()))
    }
}

impl ReferencePriceFeed for MockPriceFeed {
    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, FeedResult<Price>> {
        Box::pin(async move { self.next(symbol) })
    }
}
