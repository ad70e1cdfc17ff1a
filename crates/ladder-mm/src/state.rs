//! Anchor state owned by one engine.
//!
//! Created empty at engine start, mutated only by that engine's control
//! loop, never persisted.

use std::time::Duration;

use ladder_core::Price;
use rust_decimal::Decimal;
use tokio::time::Instant;

/// What the control loop is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnginePhase {
    #[default]
    Idle,
    /// Trim, bait/sweep/anchor, ladder fill in progress.
    Rebalancing,
    /// Top-up in progress.
    Refilling,
}

/// Quote anchor and timer bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct AnchorState {
    /// Raw reference price the quote is built around.
    anchor_price: Option<Price>,
    /// Reference price at the last completed rebalance or refill-only pass.
    prev_anchor_price: Option<Price>,
    /// Jitter drawn at the last full rebalance, percent.
    price_adjustment: Option<Decimal>,
    last_rebalance: Option<Instant>,
    last_refill: Option<Instant>,
    phase: EnginePhase,
}

impl AnchorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor_price(&self) -> Option<Price> {
        self.anchor_price
    }

    pub fn prev_anchor_price(&self) -> Option<Price> {
        self.prev_anchor_price
    }

    pub fn price_adjustment(&self) -> Option<Decimal> {
        self.price_adjustment
    }

    pub fn last_rebalance(&self) -> Option<Instant> {
        self.last_rebalance
    }

    pub fn last_refill(&self) -> Option<Instant> {
        self.last_refill
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == EnginePhase::Idle
    }

    /// The price actually quoted: anchor shifted by the current jitter.
    pub fn quoted_anchor(&self) -> Option<Price> {
        let anchor = self.anchor_price?;
        let adjustment = self.price_adjustment.unwrap_or(Decimal::ZERO);
        Some(anchor * (Decimal::ONE + adjustment / Decimal::ONE_HUNDRED))
    }

    /// Enter a working phase. Returns false if another phase is active.
    pub fn try_begin(&mut self, phase: EnginePhase) -> bool {
        if self.phase != EnginePhase::Idle {
            return false;
        }
        self.phase = phase;
        true
    }

    /// Return to idle.
    pub fn finish(&mut self) {
        self.phase = EnginePhase::Idle;
    }

    /// True if no rebalance has run yet or `interval` has elapsed.
    pub fn rebalance_due(&self, now: Instant, interval: Duration) -> bool {
        due(self.last_rebalance, now, interval)
    }

    /// True if idle and no refill has run yet or `interval` has elapsed.
    pub fn refill_due(&self, now: Instant, interval: Duration) -> bool {
        self.is_idle() && due(self.last_refill, now, interval)
    }

    /// Adopt a new anchor after a completed full rebalance.
    pub fn record_full_rebalance(&mut self, reference: Price, adjustment: Decimal, now: Instant) {
        self.anchor_price = Some(reference);
        self.prev_anchor_price = Some(reference);
        self.price_adjustment = Some(adjustment);
        self.last_rebalance = Some(now);
    }

    /// Move the anchor without re-establishing the quote. Keeps the jitter.
    pub fn record_refill_only(&mut self, reference: Price) {
        self.anchor_price = Some(reference);
        self.prev_anchor_price = Some(reference);
    }

    pub fn stamp_rebalance(&mut self, now: Instant) {
        self.last_rebalance = Some(now);
    }

    pub fn stamp_refill(&mut self, now: Instant) {
        self.last_refill = Some(now);
    }
}

fn due(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    match last {
        None => true,
        Some(at) => now.saturating_duration_since(at) >= interval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fresh_state_is_due() {
        let state = AnchorState::new();
        let now = Instant::now();
        assert!(state.rebalance_due(now, Duration::from_secs(60)));
        assert!(state.refill_due(now, Duration::from_secs(10)));
        assert!(state.anchor_price().is_none());
        assert!(state.quoted_anchor().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_respect_interval() {
        let mut state = AnchorState::new();
        state.record_full_rebalance(Price::new(dec!(100)), Decimal::ZERO, Instant::now());
        state.stamp_refill(Instant::now());

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!state.refill_due(Instant::now(), Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(state.refill_due(Instant::now(), Duration::from_secs(10)));
        assert!(!state.rebalance_due(Instant::now(), Duration::from_secs(60)));

        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(state.rebalance_due(Instant::now(), Duration::from_secs(60)));
    }

    #[test]
    fn test_phase_guard_blocks_refill() {
        let mut state = AnchorState::new();
        assert!(state.try_begin(EnginePhase::Rebalancing));
        assert!(!state.try_begin(EnginePhase::Refilling));
        assert!(!state.refill_due(Instant::now(), Duration::ZERO));

        state.finish();
        assert!(state.is_idle());
        assert!(state.try_begin(EnginePhase::Refilling));
    }

    #[test]
    fn test_quoted_anchor_applies_jitter() {
        let mut state = AnchorState::new();
        state.record_full_rebalance(Price::new(dec!(200)), dec!(0.5), Instant::now());
        assert_eq!(state.quoted_anchor(), Some(Price::new(dec!(201))));

        // Refill-only moves the anchor and keeps the jitter.
        state.record_refill_only(Price::new(dec!(100)));
        assert_eq!(state.anchor_price(), Some(Price::new(dec!(100))));
        assert_eq!(state.prev_anchor_price(), Some(Price::new(dec!(100))));
        assert_eq!(state.quoted_anchor(), Some(Price::new(dec!(100.5))));
    }
}
