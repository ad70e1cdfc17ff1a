//! Execution venue contract.
//!
//! Any transport (UI automation, REST, WebSocket) that the engine drives
//! must satisfy these six operations. Calls are awaited one at a time by a
//! single engine; implementations need not support concurrent submissions
//! from the same caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ladder_core::{BookLevel, OpenOrder, OrderId, Price, Side, Size};
use rust_decimal::Decimal;

use crate::error::AdapterResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Order execution and book inspection for one instrument.
pub trait ExchangeAdapter: Send + Sync {
    /// Place a resting limit order. Returns the venue order id.
    ///
    /// The order may execute immediately, fully or partly, against
    /// crossable liquidity (including our own orders).
    fn place_limit_order(
        &self,
        side: Side,
        price: Price,
        quantity: Size,
    ) -> BoxFuture<'_, AdapterResult<OrderId>>;

    /// Cancel one order. `Ok(false)` means the order was already gone or
    /// the venue declined to remove it.
    fn cancel_order<'a>(&'a self, order_id: &'a OrderId) -> BoxFuture<'a, AdapterResult<bool>>;

    /// Cancel every own resting order. Returns `(cancelled, total)`.
    ///
    /// Idempotent: an empty book yields `(0, 0)`.
    fn cancel_all(&self) -> BoxFuture<'_, AdapterResult<(usize, usize)>>;

    /// Own resting orders on one side.
    fn read_open_orders(&self, side: Side) -> BoxFuture<'_, AdapterResult<Vec<OpenOrder>>>;

    /// Aggregated book levels on one side, nearest the touch first.
    fn read_order_book(&self, side: Side) -> BoxFuture<'_, AdapterResult<Vec<BookLevel>>>;

    /// Free balance usable by new orders on `side`: quote notional for
    /// bids, base quantity for asks.
    fn get_available_balance(&self, side: Side) -> BoxFuture<'_, AdapterResult<Decimal>>;
}

/// Arc wrapper for adapter trait objects.
pub type DynExchange = Arc<dyn ExchangeAdapter>;
