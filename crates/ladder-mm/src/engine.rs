//! Ladder engine control loop.
//!
//! One engine owns one [`AnchorState`] and drives one adapter. Every poll
//! it checks two timers:
//!
//! - rebalance timer: fetch the reference price, then full rebalance or
//!   refill-only per [`decide`]
//! - refill timer: top up missing levels around the current anchor
//!
//! At most one of the two paths runs per poll. Adapter calls are awaited
//! one at a time, bid side first in dual mode.

use std::sync::Arc;

use ladder_core::{Price, Side};
use ladder_exchange::DynExchange;
use ladder_feed::{normalize_ticker, reference_symbol, DynPriceFeed};
use ladder_telemetry::Metrics;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::allocator::BudgetAllocator;
use crate::budget::check_initial_balance;
use crate::config::{EngineConfig, EngineMode};
use crate::error::EngineResult;
use crate::maintenance::{startup_cleanup, top_up, trim_excess};
use crate::planner::LadderPlanner;
use crate::policy::{decide, BookOccupancy, Decision, RebalanceReason};
use crate::sequencer::{OrderSequencer, SequenceOutcome};
use crate::state::{AnchorState, EnginePhase};

/// What the rebalance timer did on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Reference price unavailable; nothing changed.
    Skipped,
    Rebalanced(RebalanceReason),
    /// Bait could not be placed on any side; anchor unchanged.
    Aborted,
    Refilled,
}

pub struct Engine {
    config: Arc<EngineConfig>,
    feed: DynPriceFeed,
    sequencer: OrderSequencer,
    planner: LadderPlanner,
    allocator: BudgetAllocator,
    state: AnchorState,
    ticker: String,
    symbol: String,
    rng: StdRng,
}

impl Engine {
    /// Build an engine. The configuration is validated here.
    pub fn new(config: EngineConfig, feed: DynPriceFeed, exchange: DynExchange) -> EngineResult<Self> {
        config.validate()?;
        let ticker = normalize_ticker(&config.ticker);
        let symbol = reference_symbol(&ticker);
        let config = Arc::new(config);

        Ok(Self {
            planner: LadderPlanner::new(config.step_percent),
            allocator: BudgetAllocator::new(config.distribution_mode),
            sequencer: OrderSequencer::new(exchange, Arc::clone(&config), ticker.clone()),
            config,
            feed,
            state: AnchorState::new(),
            ticker,
            symbol,
            rng: StdRng::from_entropy(),
        })
    }

    /// Use a fixed seed for the jitter draw.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &AnchorState {
        &self.state
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Reference-venue symbol, e.g. `BTCUSDT`.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Startup: dual-side balance validation, then cleanup.
    ///
    /// # Errors
    /// Fatal errors only: insufficient startup balance, a reference price
    /// that cannot be read for that check, or a book that will not clear.
    pub async fn start(&mut self) -> EngineResult<()> {
        info!(
            ticker = %self.ticker,
            symbol = %self.symbol,
            mode = %self.config.mode,
            levels = self.config.levels,
            step_percent = %self.config.step_percent,
            distribution = self.config.distribution_mode.as_str(),
            "Engine starting"
        );

        if self.config.mode.is_dual() {
            let reference = self.feed.get_price(&self.symbol).await?;
            let exchange = self.sequencer.exchange();
            let quote = exchange.get_available_balance(Side::Bid).await?;
            let base = exchange.get_available_balance(Side::Ask).await?;
            info!(%reference, %quote, %base, "Validating initial balance");
            check_initial_balance(&self.config, reference, quote, base)?;
        }

        startup_cleanup(&self.sequencer).await
    }

    /// Run until `cancel` fires or a fatal error occurs.
    ///
    /// Calls [`Engine::start`] first. Non-fatal errors are logged and the
    /// loop carries on at the next poll.
    pub async fn run(&mut self, cancel: CancellationToken) -> EngineResult<()> {
        let span = info_span!("engine", ticker = %self.ticker, mode = %self.config.mode);
        async move {
            self.start().await?;
            let poll = self.config.timing.poll_interval();

            loop {
                if cancel.is_cancelled() {
                    break;
                }
                match self.tick().await {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => {
                        error!(error = %e, "Fatal engine error");
                        return Err(e);
                    }
                    Err(e) => warn!(error = %e, "Tick failed, continuing"),
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(poll) => {}
                }
            }

            info!("Engine stopped");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// One poll: rebalance timer, then refill timer.
    pub async fn tick(&mut self) -> EngineResult<()> {
        let mut synced = false;
        if self
            .state
            .rebalance_due(Instant::now(), self.config.rebalance_interval())
        {
            synced = self.sync_with_reference().await? != SyncOutcome::Skipped;
        }

        if !synced
            && self
                .state
                .refill_due(Instant::now(), self.config.refill_interval())
        {
            self.refill_missing().await?;
        }
        Ok(())
    }

    /// Rebalance timer body: fetch the reference, then pick a path.
    pub async fn sync_with_reference(&mut self) -> EngineResult<SyncOutcome> {
        let price = match self.feed.get_price(&self.symbol).await {
            Ok(price) => price.normalize(),
            Err(e) => {
                Metrics::feed_failure(&self.ticker);
                warn!(symbol = %self.symbol, error = %e, "Reference price unavailable, skipping tick");
                return Ok(SyncOutcome::Skipped);
            }
        };

        let occupancy = self.occupancy().await?;
        let prev = self.state.prev_anchor_price();
        let decision = decide(
            self.config.mode,
            prev,
            price,
            occupancy,
            self.config.dual_rebalance_threshold_percent,
        );
        debug!(
            %price,
            prev = ?prev.map(|p| p.to_string()),
            change_pct = ?prev.and_then(|p| price.pct_from(p)).map(|c| c.round_dp(4).to_string()),
            bid_orders = occupancy.bid,
            ask_orders = occupancy.ask,
            ?decision,
            "Reference sync"
        );

        match decision {
            Decision::FullRebalance(reason) => self.full_rebalance(price, reason).await,
            Decision::RefillOnly => {
                self.refill_only(price).await?;
                Ok(SyncOutcome::Refilled)
            }
        }
    }

    /// Trim, bait/sweep/anchor per side, ladder fill, then adopt `price`
    /// as the anchor.
    ///
    /// A side whose bait fails is skipped and left to the refill timer.
    /// The anchor moves as long as one side was established.
    pub async fn full_rebalance(
        &mut self,
        price: Price,
        reason: RebalanceReason,
    ) -> EngineResult<SyncOutcome> {
        if !self.state.try_begin(EnginePhase::Rebalancing) {
            warn!("Rebalance already in progress - skip");
            return Ok(SyncOutcome::Skipped);
        }
        let result = self.run_full_rebalance(price, reason).await;
        self.state.finish();
        result
    }

    async fn run_full_rebalance(
        &mut self,
        price: Price,
        reason: RebalanceReason,
    ) -> EngineResult<SyncOutcome> {
        let adjustment = self.draw_adjustment();
        let quoted = quoted_price(price, adjustment);
        info!(
            %reason,
            reference = %price,
            %adjustment,
            %quoted,
            "Full rebalance"
        );

        if self.config.excess_order_removal {
            for &side in self.config.mode.sides() {
                trim_excess(&self.sequencer, side).await?;
            }
        }

        let mut established = Vec::with_capacity(2);
        for &side in self.config.mode.sides() {
            let target = self.target(side, quoted);
            match self.sequencer.establish(side, target, price).await {
                Ok(SequenceOutcome::Established { anchor: None, .. }) => {
                    warn!(side = %side, %target, "Quote established without anchor order");
                }
                Ok(SequenceOutcome::Established { .. }) => {}
                Ok(SequenceOutcome::SweepAbandoned(abort)) => {
                    warn!(side = %side, %target, reason = abort.as_str(), "Sweep abandoned, ladder only");
                }
                Err(e) => {
                    error!(side = %side, error = %e, "Side skipped for this rebalance");
                    continue;
                }
            }
            established.push(side);
        }

        if established.is_empty() {
            error!(%reason, "Rebalance aborted");
            self.state.stamp_rebalance(Instant::now());
            return Ok(SyncOutcome::Aborted);
        }

        // Orders are already resting: a failed ladder read or fill must not
        // leave the anchor state behind the book.
        for &side in &established {
            let target = self.target(side, quoted);
            if let Err(e) = top_up(
                &self.sequencer,
                &self.planner,
                &self.allocator,
                side,
                target,
                price,
            )
            .await
            {
                warn!(side = %side, error = %e, "Ladder fill failed, refill timer will retry");
            }
        }

        self.state
            .record_full_rebalance(price, adjustment, Instant::now());
        Metrics::rebalance(&self.ticker, reason.as_str());
        Metrics::anchor_price(&self.ticker, price.inner().to_f64().unwrap_or_default());
        self.publish_occupancy().await;
        info!(%reason, anchor = %price, "Rebalance complete");
        Ok(SyncOutcome::Rebalanced(reason))
    }

    /// Move the anchor to `price` without re-establishing the quote, then
    /// top up every side in play.
    pub async fn refill_only(&mut self, price: Price) -> EngineResult<()> {
        if !self.state.try_begin(EnginePhase::Refilling) {
            return Ok(());
        }
        self.state.record_refill_only(price);
        self.state.stamp_rebalance(Instant::now());
        info!(anchor = %price, "Refill only");

        let result = self.top_up_all(price).await;
        self.state.finish();
        result?;

        Metrics::refill(&self.ticker, "sync");
        Metrics::anchor_price(&self.ticker, price.inner().to_f64().unwrap_or_default());
        self.publish_occupancy().await;
        Ok(())
    }

    /// Refill timer body: top up around the current anchor.
    ///
    /// No-op before the first rebalance. Stamps `last_refill` either way.
    pub async fn refill_missing(&mut self) -> EngineResult<()> {
        let Some(anchor) = self.state.anchor_price() else {
            self.state.stamp_refill(Instant::now());
            return Ok(());
        };
        if !self.state.try_begin(EnginePhase::Refilling) {
            return Ok(());
        }

        let result = self.top_up_all(anchor).await;
        self.state.finish();
        self.state.stamp_refill(Instant::now());
        let placed = result?;

        if placed > 0 {
            Metrics::refill(&self.ticker, "timer");
            info!(placed, "Refilled missing levels");
        }
        self.publish_occupancy().await;
        Ok(())
    }

    async fn top_up_all(&self, reference: Price) -> EngineResult<usize> {
        let quoted = self.state.quoted_anchor().unwrap_or(reference);
        let mut placed = 0;
        for &side in self.config.mode.sides() {
            placed += top_up(
                &self.sequencer,
                &self.planner,
                &self.allocator,
                side,
                self.target(side, quoted),
                reference,
            )
            .await?;
        }
        Ok(placed)
    }

    /// Establish price for `side` around the quoted anchor.
    ///
    /// Dual engines split by half a step so the two anchor orders never
    /// cross each other.
    fn target(&self, side: Side, quoted: Price) -> Price {
        match self.config.mode {
            EngineMode::Single(_) => quoted.normalize(),
            EngineMode::Dual => {
                let half_step = self.config.step_fraction() / Decimal::TWO;
                (quoted * side.away_factor(half_step)).normalize()
            }
        }
    }

    /// Jitter for the next full rebalance, percent. Zero when disabled.
    fn draw_adjustment(&mut self) -> Decimal {
        self.config.jitter.draw(&mut self.rng)
    }

    async fn occupancy(&self) -> EngineResult<BookOccupancy> {
        let mut occupancy = BookOccupancy::default();
        for &side in self.config.mode.sides() {
            let count = self.sequencer.exchange().read_open_orders(side).await?.len();
            occupancy.set(side, count);
        }
        Ok(occupancy)
    }

    async fn publish_occupancy(&self) {
        match self.occupancy().await {
            Ok(occupancy) => {
                for &side in self.config.mode.sides() {
                    Metrics::resting_orders(&self.ticker, side.as_str(), occupancy.count(side));
                }
            }
            Err(e) => debug!(error = %e, "Occupancy gauge not updated"),
        }
    }
}

/// Reference shifted by `adjustment` percent.
pub fn quoted_price(reference: Price, adjustment: Decimal) -> Price {
    (reference * (Decimal::ONE + adjustment / Decimal::ONE_HUNDRED)).normalize()
}
