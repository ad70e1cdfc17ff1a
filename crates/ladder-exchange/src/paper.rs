//! In-memory paper venue.
//!
//! A single-instrument limit order book holding our own orders alongside
//! seeded external liquidity. Placements match immediately against
//! crossable resting orders at the resting price, own orders included, so
//! a bait followed by a sweep at the same price consumes each other as on
//! a real venue. Own orders reserve balance while resting.
//!
//! Fault injection hooks let tests exercise the retry and consistency
//! paths of the engine.

use std::collections::BTreeMap;

use ladder_core::{BookLevel, OpenOrder, OrderId, Price, Side, Size};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::{BoxFuture, ExchangeAdapter};
use crate::error::{AdapterError, AdapterResult};

/// Starting balances for the paper venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Free quote currency (e.g. USDT).
    #[serde(default = "default_quote_balance")]
    pub quote_balance: Decimal,
    /// Free base asset.
    #[serde(default = "default_base_balance")]
    pub base_balance: Decimal,
}

fn default_quote_balance() -> Decimal {
    Decimal::from(10_000)
}

fn default_base_balance() -> Decimal {
    Decimal::ZERO
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            quote_balance: default_quote_balance(),
            base_balance: default_base_balance(),
        }
    }
}

/// One own placement as submitted, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub side: Side,
    pub price: Price,
    pub quantity: Size,
    pub order_id: OrderId,
}

#[derive(Debug, Clone)]
struct RestingOrder {
    id: OrderId,
    side: Side,
    price: Price,
    remaining: Size,
    own: bool,
    seq: u64,
}

#[derive(Debug, Default)]
struct BookState {
    orders: Vec<RestingOrder>,
    next_seq: u64,
    quote_free: Decimal,
    base_free: Decimal,
    fail_placements: u32,
    fail_cancels: u32,
    sticky: bool,
    placements: Vec<Placement>,
    fills: u64,
}

impl BookState {
    /// Index of the best resting order an incoming `side` order at `limit`
    /// can trade with. Price priority, then time priority.
    fn best_crossable(&self, side: Side, limit: Price) -> Option<usize> {
        let maker_side = side.opposite();
        self.orders
            .iter()
            .enumerate()
            .filter(|(_, o)| o.side == maker_side && !side.is_better(o.price, limit))
            .min_by(|(_, a), (_, b)| {
                let by_price = match maker_side {
                    Side::Ask => a.price.cmp(&b.price),
                    Side::Bid => b.price.cmp(&a.price),
                };
                by_price.then(a.seq.cmp(&b.seq))
            })
            .map(|(i, _)| i)
    }

    fn release(&mut self, side: Side, price: Price, remaining: Size) {
        match side {
            Side::Bid => self.quote_free += remaining.notional(price),
            Side::Ask => self.base_free += remaining.inner(),
        }
    }

    fn place(&mut self, side: Side, price: Price, quantity: Size, own: bool) -> AdapterResult<OrderId> {
        if own && self.fail_placements > 0 {
            self.fail_placements -= 1;
            return Err(AdapterError::Unavailable(
                "injected placement failure".to_string(),
            ));
        }
        if !price.is_positive() || !quantity.is_positive() {
            return Err(AdapterError::Rejected(format!(
                "invalid order {side} {quantity} @ {price}"
            )));
        }

        if own {
            let (required, available) = match side {
                Side::Bid => (quantity.notional(price), self.quote_free),
                Side::Ask => (quantity.inner(), self.base_free),
            };
            if required > available {
                return Err(AdapterError::InsufficientBalance {
                    side,
                    required,
                    available,
                });
            }
            match side {
                Side::Bid => self.quote_free -= required,
                Side::Ask => self.base_free -= required,
            }
        }

        let id = OrderId::generate();
        let mut remaining = quantity;

        while remaining.is_positive() {
            let Some(idx) = self.best_crossable(side, price) else {
                break;
            };
            let maker = &mut self.orders[idx];
            let fill = remaining.min(maker.remaining);
            let fill_price = maker.price;
            let maker_own = maker.own;
            maker.remaining = maker.remaining - fill;
            if !maker.remaining.is_positive() {
                self.orders.remove(idx);
            }
            remaining = remaining - fill;
            self.fills += 1;

            // Taker settles at the maker's price.
            if own {
                match side {
                    Side::Bid => {
                        self.quote_free += fill.notional(price) - fill.notional(fill_price);
                        self.base_free += fill.inner();
                    }
                    Side::Ask => self.quote_free += fill.notional(fill_price),
                }
            }
            if maker_own {
                match side.opposite() {
                    Side::Bid => self.base_free += fill.inner(),
                    Side::Ask => self.quote_free += fill.notional(fill_price),
                }
            }
            debug!(
                taker = %side,
                price = %fill_price,
                quantity = %fill,
                maker_own,
                taker_own = own,
                "Paper fill"
            );
        }

        if remaining.is_positive() {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.orders.push(RestingOrder {
                id: id.clone(),
                side,
                price,
                remaining,
                own,
                seq,
            });
        }

        if own {
            self.placements.push(Placement {
                side,
                price,
                quantity,
                order_id: id.clone(),
            });
        }
        Ok(id)
    }

    fn cancel(&mut self, order_id: &OrderId) -> AdapterResult<bool> {
        if self.fail_cancels > 0 {
            self.fail_cancels -= 1;
            return Err(AdapterError::Unavailable("injected cancel failure".to_string()));
        }
        if self.sticky {
            return Ok(false);
        }
        let Some(idx) = self
            .orders
            .iter()
            .position(|o| o.own && &o.id == order_id)
        else {
            return Ok(false);
        };
        let order = self.orders.remove(idx);
        self.release(order.side, order.price, order.remaining);
        Ok(true)
    }

    fn cancel_all(&mut self) -> AdapterResult<(usize, usize)> {
        if self.fail_cancels > 0 {
            self.fail_cancels -= 1;
            return Err(AdapterError::Unavailable("injected cancel failure".to_string()));
        }
        let total = self.orders.iter().filter(|o| o.own).count();
        if self.sticky {
            return Ok((0, total));
        }
        let (own, external): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.orders).into_iter().partition(|o| o.own);
        self.orders = external;
        for order in &own {
            self.release(order.side, order.price, order.remaining);
        }
        Ok((own.len(), total))
    }

    fn open_orders(&self, side: Side) -> Vec<OpenOrder> {
        let mut orders: Vec<OpenOrder> = self
            .orders
            .iter()
            .filter(|o| o.own && o.side == side)
            .map(|o| OpenOrder {
                side,
                price: o.price,
                quantity: o.remaining,
                order_id: o.id.clone(),
            })
            .collect();
        orders.sort_by(|a, b| match side {
            Side::Bid => b.price.cmp(&a.price),
            Side::Ask => a.price.cmp(&b.price),
        });
        orders
    }

    fn book(&self, side: Side) -> Vec<BookLevel> {
        let mut levels: BTreeMap<Price, Size> = BTreeMap::new();
        for order in self.orders.iter().filter(|o| o.side == side) {
            let entry = levels.entry(order.price).or_default();
            *entry = *entry + order.remaining;
        }
        let iter = levels
            .into_iter()
            .map(|(price, quantity)| BookLevel { price, quantity });
        match side {
            Side::Bid => iter.rev().collect(),
            Side::Ask => iter.collect(),
        }
    }
}

/// Paper venue implementing [`ExchangeAdapter`].
#[derive(Debug)]
pub struct PaperExchange {
    state: Mutex<BookState>,
}

impl PaperExchange {
    pub fn new(config: &PaperConfig) -> Self {
        Self {
            state: Mutex::new(BookState {
                quote_free: config.quote_balance,
                base_free: config.base_balance,
                ..BookState::default()
            }),
        }
    }

    /// Add external liquidity. Crossable own orders are filled first, as if
    /// another participant had sent the order.
    pub fn seed(&self, side: Side, price: Price, quantity: Size) -> AdapterResult<OrderId> {
        self.state.lock().place(side, price, quantity, false)
    }

    /// Make the next `n` own placements fail with a retryable error.
    pub fn fail_next_placements(&self, n: u32) {
        self.state.lock().fail_placements = n;
    }

    /// Make the next `n` cancel calls fail with a retryable error.
    pub fn fail_next_cancels(&self, n: u32) {
        self.state.lock().fail_cancels = n;
    }

    /// While set, cancels report nothing removed and own orders stay.
    pub fn set_sticky_orders(&self, sticky: bool) {
        self.state.lock().sticky = sticky;
    }

    /// Own placements in submission order.
    pub fn placements(&self) -> Vec<Placement> {
        self.state.lock().placements.clone()
    }

    /// Number of individual fills executed so far.
    pub fn fill_count(&self) -> u64 {
        self.state.lock().fills
    }

    /// `(quote_free, base_free)`.
    pub fn balances(&self) -> (Decimal, Decimal) {
        let state = self.state.lock();
        (state.quote_free, state.base_free)
    }

    /// Own resting orders on `side`, nearest the touch first.
    pub fn own_orders(&self, side: Side) -> Vec<OpenOrder> {
        self.state.lock().open_orders(side)
    }
}

impl ExchangeAdapter for PaperExchange {
    fn place_limit_order(
        &self,
        side: Side,
        price: Price,
        quantity: Size,
    ) -> BoxFuture<'_, AdapterResult<OrderId>> {
        Box::pin(async move { self.state.lock().place(side, price, quantity, true) })
    }

    fn cancel_order<'a>(&'a self, order_id: &'a OrderId) -> BoxFuture<'a, AdapterResult<bool>> {
        Box::pin(async move { self.state.lock().cancel(order_id) })
    }

    fn cancel_all(&self) -> BoxFuture<'_, AdapterResult<(usize, usize)>> {
        Box::pin(async move { self.state.lock().cancel_all() })
    }

    fn read_open_orders(&self, side: Side) -> BoxFuture<'_, AdapterResult<Vec<OpenOrder>>> {
        Box::pin(async move { Ok(self.state.lock().open_orders(side)) })
    }

    fn read_order_book(&self, side: Side) -> BoxFuture<'_, AdapterResult<Vec<BookLevel>>> {
        Box::pin(async move { Ok(self.state.lock().book(side)) })
    }

    fn get_available_balance(&self, side: Side) -> BoxFuture<'_, AdapterResult<Decimal>> {
        Box::pin(async move {
            let state = self.state.lock();
            Ok(match side {
                Side::Bid => state.quote_free,
                Side::Ask => state.base_free,
            })
        })
    }
}
