//! Precision-safe decimal types for quoting.
//!
//! Uses `rust_decimal` for exact decimal arithmetic. Every price and
//! quantity handed to a venue is normalized to a fixed number of decimal
//! places first.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

use crate::error::CoreError;

/// Decimal places kept on submitted prices.
pub const PRICE_DP: u32 = 8;

/// Decimal places kept on submitted quantities.
pub const QTY_DP: u32 = 8;

/// Parse a plain decimal string such as `"43512.10000000"`.
///
/// Exponent notation (`"1.5e3"`) is accepted. Any other character is an
/// error.
pub fn parse_decimal(text: &str) -> crate::Result<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CoreError::InvalidAmount(text.to_string()));
    }
    match Decimal::from_str(text) {
        Ok(value) => Ok(value),
        Err(_) if text.contains(|c: char| c == 'e' || c == 'E') => {
            Ok(Decimal::from_scientific(text)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse a displayed amount such as `"43,512.10 USDT"`.
///
/// Thousands separators and a trailing unit after whitespace are dropped.
/// The remaining number must parse with [`parse_decimal`].
pub fn parse_amount(text: &str) -> crate::Result<Decimal> {
    let number: String = text
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| *c != ',')
        .collect();
    parse_decimal(&number).map_err(|_| CoreError::InvalidAmount(text.to_string()))
}

/// Price with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with quantities in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Round to `PRICE_DP` decimal places (midpoint away from zero).
    #[inline]
    pub fn normalize(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(PRICE_DP, RoundingStrategy::MidpointAwayFromZero)
                .normalize(),
        )
    }

    /// Parse a price string strictly, rejecting zero and negative values.
    pub fn parse_positive(text: &str) -> crate::Result<Self> {
        let price = Self(parse_decimal(text)?);
        if !price.is_positive() {
            return Err(CoreError::InvalidPrice(text.to_string()));
        }
        Ok(price)
    }

    /// Calculate percentage difference from another price.
    #[inline]
    pub fn pct_from(&self, other: Price) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        Some((self.0 - other.0) / other.0 * Decimal::ONE_HUNDRED)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Price {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

/// Quantity of the base asset with exact decimal precision.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Size(pub Decimal);

impl Size {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Round to `QTY_DP` decimal places (midpoint away from zero).
    #[inline]
    pub fn normalize(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(QTY_DP, RoundingStrategy::MidpointAwayFromZero)
                .normalize(),
        )
    }

    /// Round down to `QTY_DP` decimal places, so a sized order never
    /// spends more than the amount it was sized from.
    #[inline]
    pub fn round_down(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(QTY_DP, RoundingStrategy::ToZero)
                .normalize(),
        )
    }

    /// Quantity that a quote-currency notional buys at `price`.
    ///
    /// Returns zero for a non-positive price.
    #[inline]
    pub fn from_notional(notional: Decimal, price: Price) -> Self {
        if !price.is_positive() {
            return Self::ZERO;
        }
        Self(notional / price.0)
    }

    /// Calculate notional value: size * price.
    #[inline]
    pub fn notional(&self, price: Price) -> Decimal {
        self.0 * price.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Size {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Size {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Size {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Size {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Size {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Size {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

impl std::iter::Sum for Size {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Size::ZERO, |acc, s| acc + s)
    }
}
