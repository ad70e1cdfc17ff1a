//! Side budget resolution.
//!
//! Amounts are in the side's own unit: quote notional for bids, base
//! quantity for asks. An ask budget configured as a fixed amount is a
//! quote value and is converted at the reference price.

use ladder_core::{OpenOrder, Price, Side, Size};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::{EngineConfig, SideBudget};
use crate::error::{EngineError, EngineResult};

/// Headroom required over fixed budgets at dual-side startup.
pub const INITIAL_BALANCE_BUFFER: Decimal = dec!(1.1);

/// Balance inputs read from the venue for one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    /// Free balance, side units.
    pub available: Decimal,
    /// Held by own resting orders, side units.
    pub committed: Decimal,
}

impl BalanceSnapshot {
    pub fn new(side: Side, available: Decimal, resting: &[OpenOrder]) -> Self {
        Self {
            available,
            committed: committed(side, resting),
        }
    }
}

/// Amount held by resting orders: notional for bids, quantity for asks.
pub fn committed(side: Side, resting: &[OpenOrder]) -> Decimal {
    resting
        .iter()
        .map(|o| match side {
            Side::Bid => o.notional(),
            Side::Ask => o.quantity.inner(),
        })
        .sum()
}

/// Convert a side amount into an order quantity at `price`, rounded down.
pub fn to_quantity(side: Side, amount: Decimal, price: Price) -> Size {
    match side {
        Side::Bid => Size::from_notional(amount, price),
        Side::Ask => Size::new(amount),
    }
    .round_down()
}

/// Amount an order of `quantity` at `price` consumes, side units.
pub fn required_amount(side: Side, quantity: Size, price: Price) -> Decimal {
    match side {
        Side::Bid => quantity.notional(price),
        Side::Ask => quantity.inner(),
    }
}

impl SideBudget {
    /// Total side budget, anchor and ladder together.
    ///
    /// Ratio budgets apply to everything the side controls: free balance
    /// plus what its resting orders already hold.
    pub fn total(&self, side: Side, reference: Price, balance: BalanceSnapshot) -> Decimal {
        match (*self, side) {
            (SideBudget::Fixed { amount }, Side::Bid) => amount,
            (SideBudget::Fixed { amount }, Side::Ask) => {
                if reference.is_positive() {
                    amount / reference.inner()
                } else {
                    Decimal::ZERO
                }
            }
            (SideBudget::Ratio { ratio }, _) => (balance.available + balance.committed) * ratio,
        }
    }

    /// Largest amount the sweep may consume right now.
    ///
    /// Capped by the live free balance and, for ratio budgets, by that
    /// ratio of it.
    pub fn sweep_allowance(&self, side: Side, reference: Price, available: Decimal) -> Decimal {
        match *self {
            SideBudget::Fixed { .. } => self
                .total(side, reference, BalanceSnapshot::default())
                .min(available),
            SideBudget::Ratio { ratio } => available * ratio,
        }
    }
}

/// Anchor order share of a side total.
pub fn anchor_amount(total: Decimal, anchor_ratio: Decimal) -> Decimal {
    (total * anchor_ratio).max(Decimal::ZERO)
}

/// Budget for new ladder levels.
///
/// At most the ladder share `total * (1 - anchor_ratio)`, never more than
/// `total - committed`, and never more than the free balance.
pub fn ladder_budget(total: Decimal, anchor_ratio: Decimal, balance: BalanceSnapshot) -> Decimal {
    let ladder_share = total * (Decimal::ONE - anchor_ratio);
    let remaining = total - balance.committed;
    ladder_share
        .min(remaining)
        .min(balance.available)
        .max(Decimal::ZERO)
}

/// Startup balance check for a dual-side engine.
///
/// Fixed budgets need 10% headroom: quote balance against the bid amount,
/// base balance valued at `reference` against the ask amount. Ratio
/// budgets only need a non-zero balance.
pub fn check_initial_balance(
    config: &EngineConfig,
    reference: Price,
    quote_available: Decimal,
    base_available: Decimal,
) -> EngineResult<()> {
    match config.bid_budget {
        SideBudget::Fixed { amount } => {
            let required = amount * INITIAL_BALANCE_BUFFER;
            if quote_available < required {
                return Err(EngineError::InsufficientBalance {
                    side: Side::Bid,
                    required,
                    available: quote_available,
                });
            }
        }
        SideBudget::Ratio { .. } if quote_available <= Decimal::ZERO => {
            return Err(EngineError::InsufficientBalance {
                side: Side::Bid,
                required: Decimal::ZERO,
                available: quote_available,
            });
        }
        SideBudget::Ratio { .. } => {}
    }

    if base_available <= Decimal::ZERO {
        return Err(EngineError::InsufficientBalance {
            side: Side::Ask,
            required: Decimal::ZERO,
            available: base_available,
        });
    }
    if let SideBudget::Fixed { amount } = config.ask_budget {
        let required = amount * INITIAL_BALANCE_BUFFER;
        let value = base_available * reference.inner();
        if value < required {
            return Err(EngineError::InsufficientBalance {
                side: Side::Ask,
                required,
                available: value,
            });
        }
    }
    Ok(())
}
