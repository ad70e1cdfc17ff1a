//! Prometheus metrics for the ladder market maker.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration
//! failure means duplicate metric names, a programming error that should
//! crash at startup. These panics only occur during static
//! initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder,
};

/// Full rebalances started.
/// Labels: ticker, reason (initial/empty_book/adverse_move/threshold)
pub static REBALANCE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ladder_rebalance_total",
        "Total full rebalances started",
        &["ticker", "reason"]
    )
    .unwrap()
});

/// Rebalance steps aborted before the anchor order.
/// Labels: ticker, side, reason (bait_failed/read_failed/insufficient_balance/sweep_failed)
pub static REBALANCE_ABORTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ladder_rebalance_aborted_total",
        "Total rebalance steps abandoned",
        &["ticker", "side", "reason"]
    )
    .unwrap()
});

/// Refill passes.
/// Labels: ticker, path (sync/timer)
pub static REFILL_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ladder_refill_total",
        "Total refill passes",
        &["ticker", "path"]
    )
    .unwrap()
});

/// Orders accepted by the venue.
/// Labels: ticker, side, role (bait/sweep/anchor/ladder)
pub static ORDERS_PLACED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ladder_orders_placed_total",
        "Total orders placed",
        &["ticker", "side", "role"]
    )
    .unwrap()
});

/// Orders given up on after retries.
/// Labels: ticker, side, role
pub static ORDERS_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ladder_orders_failed_total",
        "Total orders that failed after retries",
        &["ticker", "side", "role"]
    )
    .unwrap()
});

/// Cancel attempts.
/// Labels: ticker, side, outcome (cancelled/missing/failed/timeout)
pub static CANCELS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ladder_cancels_total",
        "Total cancel attempts by outcome",
        &["ticker", "side", "outcome"]
    )
    .unwrap()
});

/// Reference price lookups that failed after retries.
pub static FEED_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ladder_feed_failures_total",
        "Total reference price failures",
        &["ticker"]
    )
    .unwrap()
});

/// Current quoted anchor price.
pub static ANCHOR_PRICE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "ladder_anchor_price",
        "Current anchor price",
        &["ticker"]
    )
    .unwrap()
});

/// Own resting orders per side, as last read.
pub static RESTING_ORDERS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "ladder_resting_orders",
        "Own resting orders per side",
        &["ticker", "side"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a full rebalance start.
    pub fn rebalance(ticker: &str, reason: &str) {
        REBALANCE_TOTAL.with_label_values(&[ticker, reason]).inc();
    }

    /// Record an abandoned rebalance step.
    pub fn rebalance_aborted(ticker: &str, side: &str, reason: &str) {
        REBALANCE_ABORTED_TOTAL
            .with_label_values(&[ticker, side, reason])
            .inc();
    }

    /// Record a refill pass.
    pub fn refill(ticker: &str, path: &str) {
        REFILL_TOTAL.with_label_values(&[ticker, path]).inc();
    }

    /// Record an accepted order.
    pub fn order_placed(ticker: &str, side: &str, role: &str) {
        ORDERS_PLACED_TOTAL
            .with_label_values(&[ticker, side, role])
            .inc();
    }

    /// Record an order abandoned after retries.
    pub fn order_failed(ticker: &str, side: &str, role: &str) {
        ORDERS_FAILED_TOTAL
            .with_label_values(&[ticker, side, role])
            .inc();
    }

    /// Record a cancel outcome.
    pub fn cancel(ticker: &str, side: &str, outcome: &str) {
        CANCELS_TOTAL
            .with_label_values(&[ticker, side, outcome])
            .inc();
    }

    /// Record a reference price failure.
    pub fn feed_failure(ticker: &str) {
        FEED_FAILURES_TOTAL.with_label_values(&[ticker]).inc();
    }

    /// Update the anchor price gauge.
    pub fn anchor_price(ticker: &str, price: f64) {
        ANCHOR_PRICE.with_label_values(&[ticker]).set(price);
    }

    /// Update the resting order gauge.
    pub fn resting_orders(ticker: &str, side: &str, count: usize) {
        RESTING_ORDERS
            .with_label_values(&[ticker, side])
            .set(count as f64);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder
            .encode(&prometheus::gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
