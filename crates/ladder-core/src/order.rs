//! Order-related types and identifiers.
//!
//! Provides the quoting side, order identifiers, and the snapshot types
//! read back from a venue (open orders, order book levels) as well as the
//! ladder levels the planner produces.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Price, Size};

/// Book side: bid (buy) or ask (sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Both sides, bid first. Dual-side work runs in this order.
    pub const BOTH: [Side; 2] = [Side::Bid, Side::Ask];

    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }

    /// Per-level multiplier moving a price away from the touch.
    ///
    /// `1 - step` for bids, `1 + step` for asks. `step` is a fraction.
    pub fn away_factor(&self, step: Decimal) -> Decimal {
        match self {
            Self::Bid => Decimal::ONE - step,
            Self::Ask => Decimal::ONE + step,
        }
    }

    /// True if `price` is more aggressive than `reference` on this side's
    /// book (higher for bids, lower for asks).
    pub fn is_better(&self, price: Price, reference: Price) -> bool {
        match self {
            Self::Bid => price > reference,
            Self::Ask => price < reference,
        }
    }

    /// True if `price` sits farther from the touch than `reference`.
    pub fn is_farther(&self, price: Price, reference: Price) -> bool {
        self.is_better(reference, price)
    }

    /// The outermost (farthest from touch) of the given prices.
    pub fn outermost<I: IntoIterator<Item = Price>>(&self, prices: I) -> Option<Price> {
        let iter = prices.into_iter();
        match self {
            Self::Bid => iter.min(),
            Self::Ask => iter.max(),
        }
    }

    /// Lower-case name, as used in config files and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bid => "bid",
            Self::Ask => "ask",
        }
    }

    /// Upper-case label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bid => "BID",
            Self::Ask => "ASK",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Venue order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a fresh identifier.
    ///
    /// Format: `lmm_{uuid_short}`
    pub fn generate() -> Self {
        let uuid_short = &Uuid::new_v4().simple().to_string()[..12];
        Self(format!("lmm_{uuid_short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One of our own resting orders as reported by the venue.
///
/// A snapshot: the engine never treats it as state it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub side: Side,
    pub price: Price,
    pub quantity: Size,
    pub order_id: OrderId,
}

impl OpenOrder {
    /// Quote-currency value of the remaining quantity.
    pub fn notional(&self) -> Decimal {
        self.quantity.notional(self.price)
    }
}

/// Aggregated resting liquidity at one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Size,
}

/// A target order produced by one planning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderLevel {
    pub side: Side,
    pub price: Price,
    pub quantity: Size,
}

impl LadderLevel {
    pub fn notional(&self) -> Decimal {
        self.quantity.notional(self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite(), Side::Bid);
    }

    #[test]
    fn test_away_factor() {
        assert_eq!(Side::Bid.away_factor(dec!(0.01)), dec!(0.99));
        assert_eq!(Side::Ask.away_factor(dec!(0.01)), dec!(1.01));
    }

    #[test]
    fn test_is_better_and_farther() {
        let hi = Price::new(dec!(101));
        let lo = Price::new(dec!(99));

        assert!(Side::Bid.is_better(hi, lo));
        assert!(Side::Ask.is_better(lo, hi));
        assert!(Side::Bid.is_farther(lo, hi));
        assert!(Side::Ask.is_farther(hi, lo));
        assert!(!Side::Bid.is_better(lo, lo));
    }

    #[test]
    fn test_outermost() {
        let prices = [dec!(99), dec!(97), dec!(98)].map(Price::new);
        assert_eq!(Side::Bid.outermost(prices), Some(Price::new(dec!(97))));
        assert_eq!(Side::Ask.outermost(prices), Some(Price::new(dec!(99))));
        assert_eq!(Side::Bid.outermost(Vec::new()), None);
    }

    #[test]
    fn test_order_id_unique() {
        let id1 = OrderId::generate();
        let id2 = OrderId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("lmm_"));
    }
}
