//! Session summary read back from the Prometheus collectors.

use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use prometheus::CounterVec;
use tracing::info;

use crate::metrics::{
    ANCHOR_PRICE, CANCELS_TOTAL, FEED_FAILURES_TOTAL, ORDERS_FAILED_TOTAL, ORDERS_PLACED_TOTAL,
    REBALANCE_ABORTED_TOTAL, REBALANCE_TOTAL, REFILL_TOTAL,
};

/// Counters for one ticker since the process started.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub ticker: String,
    pub rebalances: u64,
    pub rebalances_aborted: u64,
    pub refills: u64,
    pub orders_placed: u64,
    pub orders_failed: u64,
    pub cancels: u64,
    pub feed_failures: u64,
    pub anchor_price: f64,
}

/// Session statistics reporter.
pub struct SessionStatsReporter {
    ticker: String,
    start_time: DateTime<Utc>,
}

impl SessionStatsReporter {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            start_time: Utc::now(),
        }
    }

    /// Current statistics for the ticker.
    pub fn get_stats(&self) -> SessionStats {
        let ticker = self.ticker.as_str();
        SessionStats {
            ticker: ticker.to_string(),
            rebalances: sum_for_ticker(&REBALANCE_TOTAL, ticker),
            rebalances_aborted: sum_for_ticker(&REBALANCE_ABORTED_TOTAL, ticker),
            refills: sum_for_ticker(&REFILL_TOTAL, ticker),
            orders_placed: sum_for_ticker(&ORDERS_PLACED_TOTAL, ticker),
            orders_failed: sum_for_ticker(&ORDERS_FAILED_TOTAL, ticker),
            cancels: sum_for_ticker(&CANCELS_TOTAL, ticker),
            feed_failures: sum_for_ticker(&FEED_FAILURES_TOTAL, ticker),
            anchor_price: ANCHOR_PRICE.with_label_values(&[ticker]).get(),
        }
    }

    /// Output the session summary to logs.
    pub fn output_summary(&self) {
        let s = self.get_stats();
        let duration = Utc::now() - self.start_time;
        let hours = duration.num_hours();
        let minutes = duration.num_minutes() % 60;

        info!("========== Session Summary: {} ==========", s.ticker);
        info!(
            "Started: {} ({} hours {} minutes)",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            hours,
            minutes
        );
        info!(
            "  Rebalances: {} (aborted steps: {})",
            s.rebalances, s.rebalances_aborted
        );
        info!("  Refills: {}", s.refills);
        info!(
            "  Orders: {} placed, {} failed",
            s.orders_placed, s.orders_failed
        );
        info!("  Cancels: {}", s.cancels);
        info!("  Feed failures: {}", s.feed_failures);
        info!("  Last anchor: {:.8}", s.anchor_price);
        info!("==========================================");
    }
}

/// Sum a counter across every label set whose `ticker` label matches.
fn sum_for_ticker(counter: &CounterVec, ticker: &str) -> u64 {
    let mut total = 0.0;
    for mf in counter.collect() {
        for m in mf.get_metric() {
            let matches = m
                .get_label()
                .iter()
                .any(|pair| pair.get_name() == "ticker" && pair.get_value() == ticker);
            if matches {
                total += m.get_counter().get_value();
            }
        }
    }
    total as u64
}
