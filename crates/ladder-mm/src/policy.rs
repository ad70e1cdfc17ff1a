//! Rebalance-vs-refill decision.
//!
//! Pure function of the previous anchor, the fresh reference price, and
//! how many own orders rest on each side in play.

use std::fmt;

use ladder_core::{Price, Side};
use rust_decimal::Decimal;

use crate::config::EngineMode;

/// Why a full rebalance was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceReason {
    /// No anchor yet.
    Initial,
    /// A side in play has no resting orders.
    EmptyBook,
    /// Single side: price moved toward the quote, making it stale.
    AdverseMove,
    /// Dual side: absolute move beyond the threshold.
    Threshold,
}

impl RebalanceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::EmptyBook => "empty_book",
            Self::AdverseMove => "adverse_move",
            Self::Threshold => "threshold",
        }
    }
}

impl fmt::Display for RebalanceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    FullRebalance(RebalanceReason),
    /// Move the anchor to the new price and top up.
    RefillOnly,
}

/// Own resting order counts per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookOccupancy {
    pub bid: usize,
    pub ask: usize,
}

impl BookOccupancy {
    pub fn count(&self, side: Side) -> usize {
        match side {
            Side::Bid => self.bid,
            Side::Ask => self.ask,
        }
    }

    pub fn set(&mut self, side: Side, count: usize) {
        match side {
            Side::Bid => self.bid = count,
            Side::Ask => self.ask = count,
        }
    }
}

/// True if moving from `prev` to `new` pushes the market into this side's
/// quote: a rise for bids, a fall for asks.
pub fn is_adverse(side: Side, prev: Price, new: Price) -> bool {
    side.is_better(new, prev)
}

/// Choose between a full rebalance and a refill-only pass.
///
/// `dual_threshold_percent` only applies to dual engines; the move must
/// strictly exceed it.
pub fn decide(
    mode: EngineMode,
    prev_anchor: Option<Price>,
    new_price: Price,
    occupancy: BookOccupancy,
    dual_threshold_percent: Decimal,
) -> Decision {
    let Some(prev) = prev_anchor else {
        return Decision::FullRebalance(RebalanceReason::Initial);
    };

    if mode.sides().iter().any(|&side| occupancy.count(side) == 0) {
        return Decision::FullRebalance(RebalanceReason::EmptyBook);
    }

    match mode {
        EngineMode::Single(side) => {
            if is_adverse(side, prev, new_price) {
                Decision::FullRebalance(RebalanceReason::AdverseMove)
            } else {
                Decision::RefillOnly
            }
        }
        EngineMode::Dual => {
            let change = new_price.pct_from(prev).unwrap_or(Decimal::ZERO);
            if change.abs() > dual_threshold_percent {
                Decision::FullRebalance(RebalanceReason::Threshold)
            } else {
                Decision::RefillOnly
            }
        }
    }
}
