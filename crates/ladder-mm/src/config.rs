//! Ladder engine configuration.

use std::fmt;
use std::time::Duration;

use ladder_core::{RetryPolicy, Side};
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Which side(s) an engine quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EngineMode {
    /// Quote one side only.
    Single(Side),
    /// Quote both sides through one adapter, bid first.
    Dual,
}

impl EngineMode {
    /// Sides in play, in execution order.
    pub fn sides(&self) -> &'static [Side] {
        match self {
            Self::Single(Side::Bid) => &[Side::Bid],
            Self::Single(Side::Ask) => &[Side::Ask],
            Self::Dual => &Side::BOTH,
        }
    }

    pub fn is_dual(&self) -> bool {
        matches!(self, Self::Dual)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single(side) => side.as_str(),
            Self::Dual => "dual",
        }
    }
}

impl Default for EngineMode {
    fn default() -> Self {
        Self::Single(Side::Bid)
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for EngineMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bid" => Ok(Self::Single(Side::Bid)),
            "ask" => Ok(Self::Single(Side::Ask)),
            "dual" => Ok(Self::Dual),
            other => Err(format!("unknown engine mode {other:?} (bid|ask|dual)")),
        }
    }
}

impl From<EngineMode> for String {
    fn from(mode: EngineMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Weighting policy for splitting a budget across ladder levels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    /// Same weight for every level.
    #[default]
    Equal,
    /// Weight proportional to distance from the anchor (1, 2, .., N).
    Pyramid,
}

impl DistributionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Pyramid => "pyramid",
        }
    }
}

/// Per-side budget: a fixed amount or a share of the live balance.
///
/// For bids `amount` is quote notional. For asks `amount` is the quote
/// value of the coin to commit, converted at the reference price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SideBudget {
    Fixed { amount: Decimal },
    Ratio { ratio: Decimal },
}

impl Default for SideBudget {
    fn default() -> Self {
        Self::Ratio {
            ratio: Decimal::new(5, 1), // 0.5
        }
    }
}

/// Random offset applied to the quoted anchor at each full rebalance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceJitter {
    #[serde(default)]
    pub enabled: bool,
    /// Lower bound, percent.
    #[serde(default)]
    pub min_percent: Decimal,
    /// Upper bound, percent.
    #[serde(default)]
    pub max_percent: Decimal,
}

impl PriceJitter {
    /// Draw an adjustment, percent, uniformly from the bounds.
    ///
    /// Zero when disabled. Rounded to 4 decimal places.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Decimal {
        if !self.enabled {
            return Decimal::ZERO;
        }
        if self.min_percent >= self.max_percent {
            return self.min_percent;
        }
        let (Some(min), Some(max)) = (self.min_percent.to_f64(), self.max_percent.to_f64()) else {
            return Decimal::ZERO;
        };
        let draw: f64 = rng.gen_range(min..=max);
        Decimal::from_f64(draw)
            .map(|d| d.round_dp(4).clamp(self.min_percent, self.max_percent))
            .unwrap_or(Decimal::ZERO)
    }
}

/// Pauses and retry caps around adapter calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineTiming {
    /// Control loop resolution.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after every accepted placement.
    #[serde(default = "default_settle_after_place_ms")]
    pub settle_after_place_ms: u64,

    /// Pause after the bait before reading the book.
    #[serde(default = "default_settle_after_bait_ms")]
    pub settle_after_bait_ms: u64,

    /// Attempts per order submission.
    #[serde(default = "default_order_retry_attempts")]
    pub order_retry_attempts: u32,

    /// Fixed delay between submission attempts.
    #[serde(default = "default_order_retry_delay_ms")]
    pub order_retry_delay_ms: u64,

    /// Full cleanup attempts at startup.
    #[serde(default = "default_cleanup_attempts")]
    pub cleanup_attempts: u32,

    /// Pause between cleanup attempts.
    #[serde(default = "default_cleanup_retry_delay_ms")]
    pub cleanup_retry_delay_ms: u64,

    /// Pause before the first cleanup attempt.
    #[serde(default = "default_startup_settle_ms")]
    pub startup_settle_ms: u64,
}

impl EngineTiming {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_after_place(&self) -> Duration {
        Duration::from_millis(self.settle_after_place_ms)
    }

    pub fn settle_after_bait(&self) -> Duration {
        Duration::from_millis(self.settle_after_bait_ms)
    }

    pub fn startup_settle(&self) -> Duration {
        Duration::from_millis(self.startup_settle_ms)
    }

    pub fn order_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.order_retry_attempts,
            Duration::from_millis(self.order_retry_delay_ms),
        )
    }

    pub fn cleanup_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.cleanup_attempts,
            Duration::from_millis(self.cleanup_retry_delay_ms),
        )
    }

    /// All pauses zero, same attempt caps. For tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_after_place_ms: 0,
            settle_after_bait_ms: 0,
            order_retry_attempts: default_order_retry_attempts(),
            order_retry_delay_ms: 0,
            cleanup_attempts: default_cleanup_attempts(),
            cleanup_retry_delay_ms: 0,
            startup_settle_ms: 0,
        }
    }
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_after_place_ms: default_settle_after_place_ms(),
            settle_after_bait_ms: default_settle_after_bait_ms(),
            order_retry_attempts: default_order_retry_attempts(),
            order_retry_delay_ms: default_order_retry_delay_ms(),
            cleanup_attempts: default_cleanup_attempts(),
            cleanup_retry_delay_ms: default_cleanup_retry_delay_ms(),
            startup_settle_ms: default_startup_settle_ms(),
        }
    }
}

/// Engine configuration. Immutable for the life of an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base asset ticker, e.g. "BTC". A trailing "USDT" is stripped.
    #[serde(default = "default_ticker")]
    pub ticker: String,

    #[serde(default)]
    pub mode: EngineMode,

    /// Resting orders per side, anchor order included.
    #[serde(default = "default_levels")]
    pub levels: u32,

    /// Geometric spacing between levels, percent.
    #[serde(default = "default_step_percent")]
    pub step_percent: Decimal,

    #[serde(default = "default_rebalance_interval_sec")]
    pub rebalance_interval_sec: u64,

    #[serde(default = "default_refill_interval_sec")]
    pub refill_interval_sec: u64,

    /// Upper bound on a single cancel during trimming.
    #[serde(default = "default_cancel_row_timeout_sec")]
    pub cancel_row_timeout_sec: u64,

    #[serde(default = "default_max_cancel_ops_per_cycle")]
    pub max_cancel_ops_per_cycle: u32,

    /// Share of the side budget given to the anchor order (0..=1).
    #[serde(default = "default_anchor_budget_ratio")]
    pub anchor_budget_ratio: Decimal,

    #[serde(default)]
    pub distribution_mode: DistributionMode,

    /// Quote notional of a bait order.
    #[serde(default = "default_min_order_notional")]
    pub min_order_notional: Decimal,

    #[serde(default)]
    pub bid_budget: SideBudget,

    #[serde(default)]
    pub ask_budget: SideBudget,

    #[serde(default)]
    pub jitter: PriceJitter,

    /// Trim resting orders beyond `levels`.
    #[serde(default = "default_true")]
    pub excess_order_removal: bool,

    /// Absolute move, percent, that forces a dual-side full rebalance.
    #[serde(default = "default_dual_rebalance_threshold_percent")]
    pub dual_rebalance_threshold_percent: Decimal,

    #[serde(default)]
    pub timing: EngineTiming,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            mode: EngineMode::default(),
            levels: default_levels(),
            step_percent: default_step_percent(),
            rebalance_interval_sec: default_rebalance_interval_sec(),
            refill_interval_sec: default_refill_interval_sec(),
            cancel_row_timeout_sec: default_cancel_row_timeout_sec(),
            max_cancel_ops_per_cycle: default_max_cancel_ops_per_cycle(),
            anchor_budget_ratio: default_anchor_budget_ratio(),
            distribution_mode: DistributionMode::default(),
            min_order_notional: default_min_order_notional(),
            bid_budget: SideBudget::default(),
            ask_budget: SideBudget::default(),
            jitter: PriceJitter::default(),
            excess_order_removal: true,
            dual_rebalance_threshold_percent: default_dual_rebalance_threshold_percent(),
            timing: EngineTiming::default(),
        }
    }
}

impl EngineConfig {
    /// Budget setting for one side.
    pub fn budget(&self, side: Side) -> SideBudget {
        match side {
            Side::Bid => self.bid_budget,
            Side::Ask => self.ask_budget,
        }
    }

    /// Level spacing as a fraction.
    pub fn step_fraction(&self) -> Decimal {
        self.step_percent / Decimal::ONE_HUNDRED
    }

    pub fn rebalance_interval(&self) -> Duration {
        Duration::from_secs(self.rebalance_interval_sec)
    }

    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(self.refill_interval_sec)
    }

    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_secs(self.cancel_row_timeout_sec)
    }

    /// Check every parameter. Any violation is fatal at startup.
    pub fn validate(&self) -> EngineResult<()> {
        let fail = |msg: String| Err(EngineError::Config(msg));

        if self.ticker.trim().is_empty() {
            return fail("ticker must not be empty".to_string());
        }
        if self.levels < 1 {
            return fail(format!("levels must be >= 1, got {}", self.levels));
        }
        if self.step_percent <= Decimal::ZERO || self.step_percent >= Decimal::ONE_HUNDRED {
            return fail(format!(
                "step_percent must be in (0, 100), got {}",
                self.step_percent
            ));
        }
        if self.anchor_budget_ratio < Decimal::ZERO || self.anchor_budget_ratio > Decimal::ONE {
            return fail(format!(
                "anchor_budget_ratio must be in [0, 1], got {}",
                self.anchor_budget_ratio
            ));
        }
        if self.min_order_notional <= Decimal::ZERO {
            return fail(format!(
                "min_order_notional must be > 0, got {}",
                self.min_order_notional
            ));
        }
        for side in Side::BOTH {
            match self.budget(side) {
                SideBudget::Fixed { amount } if amount <= Decimal::ZERO => {
                    return fail(format!("{side} fixed budget must be > 0, got {amount}"));
                }
                SideBudget::Ratio { ratio } if ratio <= Decimal::ZERO || ratio > Decimal::ONE => {
                    return fail(format!("{side} budget ratio must be in (0, 1], got {ratio}"));
                }
                _ => {}
            }
        }
        if self.jitter.min_percent > self.jitter.max_percent {
            return fail(format!(
                "jitter min_percent {} exceeds max_percent {}",
                self.jitter.min_percent, self.jitter.max_percent
            ));
        }
        let hundred = Decimal::ONE_HUNDRED;
        if self.jitter.min_percent <= -hundred || self.jitter.max_percent >= hundred {
            return fail(format!(
                "jitter bounds must be within (-100, 100), got [{}, {}]",
                self.jitter.min_percent, self.jitter.max_percent
            ));
        }
        if self.max_cancel_ops_per_cycle < 1 {
            return fail("max_cancel_ops_per_cycle must be >= 1".to_string());
        }
        if self.rebalance_interval_sec == 0 || self.refill_interval_sec == 0 {
            return fail("rebalance and refill intervals must be non-zero".to_string());
        }
        if self.cancel_row_timeout_sec == 0 {
            return fail("cancel_row_timeout_sec must be non-zero".to_string());
        }
        if self.timing.poll_interval_ms == 0 {
            return fail("timing.poll_interval_ms must be non-zero".to_string());
        }
        if self.dual_rebalance_threshold_percent < Decimal::ZERO {
            return fail("dual_rebalance_threshold_percent must be >= 0".to_string());
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_ticker() -> String {
    "BTC".to_string()
}
fn default_levels() -> u32 {
    5
}
fn default_step_percent() -> Decimal {
    Decimal::new(5, 1) // 0.5%
}
fn default_rebalance_interval_sec() -> u64 {
    60
}
fn default_refill_interval_sec() -> u64 {
    10
}
fn default_cancel_row_timeout_sec() -> u64 {
    5
}
fn default_max_cancel_ops_per_cycle() -> u32 {
    5
}
fn default_anchor_budget_ratio() -> Decimal {
    Decimal::new(2, 1) // 0.2
}
fn default_min_order_notional() -> Decimal {
    Decimal::new(5, 0) // 5 USDT
}
fn default_dual_rebalance_threshold_percent() -> Decimal {
    Decimal::new(3, 1) // 0.3%
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_settle_after_place_ms() -> u64 {
    150
}
fn default_settle_after_bait_ms() -> u64 {
    300
}
fn default_order_retry_attempts() -> u32 {
    3
}
fn default_order_retry_delay_ms() -> u64 {
    1000
}
fn default_cleanup_attempts() -> u32 {
    3
}
fn default_cleanup_retry_delay_ms() -> u64 {
    2000
}
fn default_startup_settle_ms() -> u64 {
    3000
}
