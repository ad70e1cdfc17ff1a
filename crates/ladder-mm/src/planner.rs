//! Geometric ladder price levels.
//!
//! Level `k` (1-based) sits at `from * (1 - step)^k` for bids and
//! `from * (1 + step)^k` for asks. `from` is the anchor for a full ladder
//! or the outermost resting price when extending an existing one, so an
//! extension never lands on an occupied level.

use ladder_core::{Price, Side};
use rust_decimal::Decimal;

/// Computes ladder prices for a fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderPlanner {
    step: Decimal,
}

impl LadderPlanner {
    /// `step_percent` is in percent: `1` means 1%.
    pub fn new(step_percent: Decimal) -> Self {
        Self {
            step: step_percent / Decimal::ONE_HUNDRED,
        }
    }

    /// Step as a fraction.
    pub fn step(&self) -> Decimal {
        self.step
    }

    /// Up to `count` prices stepping away from `from`, nearest first.
    ///
    /// Powers are accumulated exactly and each level is rounded to 8
    /// decimals only on output. Stops early if rounding stops separating
    /// levels (very small prices) or a bid would reach zero, so the output
    /// is always strictly monotonic.
    pub fn prices(&self, side: Side, from: Price, count: usize) -> Vec<Price> {
        let factor = side.away_factor(self.step);
        let mut levels: Vec<Price> = Vec::with_capacity(count);
        let mut exact = from.inner();
        let mut last = from.normalize();

        for _ in 0..count {
            exact *= factor;
            let price = Price::new(exact).normalize();
            if !price.is_positive() || !side.is_farther(price, last) {
                break;
            }
            levels.push(price);
            last = price;
        }
        levels
    }

    /// Full ladder around `anchor`.
    pub fn ladder(&self, side: Side, anchor: Price, levels: usize) -> Vec<Price> {
        self.prices(side, anchor, levels)
    }

    /// `deficit` new levels beyond the outermost resting price.
    ///
    /// Returns an empty vec if nothing rests on the side.
    pub fn extension(&self, side: Side, resting: &[Price], deficit: usize) -> Vec<Price> {
        match side.outermost(resting.iter().copied()) {
            Some(outer) => self.prices(side, outer, deficit),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn p(v: Decimal) -> Price {
        Price::new(v)
    }

    #[test]
    fn test_bid_ladder_example() {
        let planner = LadderPlanner::new(dec!(1));
        let prices = planner.ladder(Side::Bid, p(dec!(100)), 3);
        assert_eq!(prices, vec![p(dec!(99)), p(dec!(98.01)), p(dec!(97.0299))]);
    }

    #[test]
    fn test_ask_ladder_example() {
        let planner = LadderPlanner::new(dec!(1));
        let prices = planner.ladder(Side::Ask, p(dec!(100)), 3);
        assert_eq!(
            prices,
            vec![p(dec!(101)), p(dec!(102.01)), p(dec!(103.0301))]
        );
    }

    #[test]
    fn test_ladder_strictly_monotonic_and_bounded() {
        let planner = LadderPlanner::new(dec!(0.37));
        let anchor = p(dec!(43512.17));
        let first_bid = (anchor * (Decimal::ONE - planner.step())).normalize();
        let first_ask = (anchor * (Decimal::ONE + planner.step())).normalize();

        let bids = planner.ladder(Side::Bid, anchor, 25);
        assert_eq!(bids.len(), 25);
        assert_eq!(bids[0], first_bid);
        assert!(bids.windows(2).all(|w| w[1] < w[0]));
        assert!(bids[1..].iter().all(|b| *b < first_bid));

        let asks = planner.ladder(Side::Ask, anchor, 25);
        assert_eq!(asks[0], first_ask);
        assert!(asks.windows(2).all(|w| w[1] > w[0]));
        assert!(asks[1..].iter().all(|a| *a > first_ask));
    }

    #[test]
    fn test_prices_rounded_to_eight_places() {
        let planner = LadderPlanner::new(dec!(0.3));
        for price in planner.ladder(Side::Ask, p(dec!(0.123456789)), 10) {
            assert!(price.inner().scale() <= 8);
        }
    }

    #[test]
    fn test_extension_starts_beyond_outermost() {
        let planner = LadderPlanner::new(dec!(1));
        let resting = [p(dec!(100)), p(dec!(99)), p(dec!(98.01))];

        let ext = planner.extension(Side::Bid, &resting, 2);
        assert_eq!(ext, vec![p(dec!(97.0299)), p(dec!(96.059601))]);
        assert!(ext.iter().all(|e| !resting.contains(e)));

        let asks = [p(dec!(101)), p(dec!(102.01))];
        let ext = planner.extension(Side::Ask, &asks, 1);
        assert_eq!(ext, vec![p(dec!(103.0301))]);

        assert!(planner.extension(Side::Bid, &[], 3).is_empty());
    }

    #[test]
    fn test_tiny_prices_stop_when_levels_collapse() {
        let planner = LadderPlanner::new(dec!(1));
        let prices = planner.ladder(Side::Bid, p(dec!(0.00000003)), 10);
        assert!(prices.len() < 10);
        assert!(prices.windows(2).all(|w| w[1] < w[0]));
        assert!(prices.iter().all(|x| x.is_positive()));
    }

    #[test]
    fn test_zero_count_is_empty() {
        let planner = LadderPlanner::new(dec!(1));
        assert!(planner.ladder(Side::Bid, p(dec!(100)), 0).is_empty());
    }
}
