//! Budget split across ladder levels.

use ladder_core::{LadderLevel, Price, Side, Size};
use rust_decimal::Decimal;

use crate::config::DistributionMode;

/// Splits a side budget over a set of ladder prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetAllocator {
    mode: DistributionMode,
}

impl BudgetAllocator {
    pub fn new(mode: DistributionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DistributionMode {
        self.mode
    }

    /// Weights for `n` levels, nearest the anchor first. Sums to 1.
    ///
    /// Pyramid weights are `i / (1 + 2 + .. + n)`, so farther levels get
    /// more. Empty for `n == 0`.
    pub fn weights(&self, n: usize) -> Vec<Decimal> {
        if n == 0 {
            return Vec::new();
        }
        match self.mode {
            DistributionMode::Equal => {
                let w = Decimal::ONE / Decimal::from(n);
                vec![w; n]
            }
            DistributionMode::Pyramid => {
                let total = Decimal::from(n * (n + 1) / 2);
                (1..=n).map(|i| Decimal::from(i) / total).collect()
            }
        }
    }

    /// Size an order for each price.
    ///
    /// `budget` is quote notional for bids (divided by each level's price)
    /// and base quantity for asks (used directly). Quantities are rounded
    /// down so the levels never sum past `budget`; levels that round to
    /// zero are dropped.
    pub fn allocate(&self, side: Side, prices: &[Price], budget: Decimal) -> Vec<LadderLevel> {
        if budget <= Decimal::ZERO {
            return Vec::new();
        }
        prices
            .iter()
            .zip(self.weights(prices.len()))
            .filter_map(|(&price, weight)| {
                let share = budget * weight;
                let quantity = match side {
                    Side::Bid => Size::from_notional(share, price),
                    Side::Ask => Size::new(share),
                }
                .round_down();
                quantity.is_positive().then_some(LadderLevel {
                    side,
                    price,
                    quantity,
                })
            })
            .collect()
    }
}
