//! Engine integration tests.
//!
//! Drives a full `Engine` against the paper venue and a scripted price
//! feed, with paused time so interval timers can be stepped exactly.

use std::sync::Arc;
use std::time::Duration;

use ladder_core::{BookLevel, OpenOrder, OrderId, Price, Side, Size};
use ladder_exchange::{
    AdapterError, AdapterResult, BoxFuture, ExchangeAdapter, PaperConfig, PaperExchange,
};
use ladder_feed::{FeedError, MockPriceFeed};
use ladder_mm::{
    Engine, EngineConfig, EngineError, EngineMode, EngineTiming, RebalanceReason, SideBudget,
    SyncOutcome,
};
use rust_decimal::Decimal;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

fn p(v: Decimal) -> Price {
    Price::new(v)
}

fn config(mode: EngineMode) -> EngineConfig {
    EngineConfig {
        ticker: "TEST".to_string(),
        mode,
        levels: 3,
        step_percent: dec!(1),
        rebalance_interval_sec: 60,
        refill_interval_sec: 10,
        anchor_budget_ratio: dec!(0.2),
        min_order_notional: dec!(10),
        bid_budget: SideBudget::Fixed { amount: dec!(1000) },
        ask_budget: SideBudget::Fixed { amount: dec!(1000) },
        timing: EngineTiming::immediate(),
        ..EngineConfig::default()
    }
}

struct Harness {
    engine: Engine,
    paper: Arc<PaperExchange>,
    feed: Arc<MockPriceFeed>,
}

fn harness(config: EngineConfig, prices: &[Decimal]) -> Harness {
    harness_with_balances(config, prices, dec!(10000), dec!(100))
}

fn harness_with_balances(
    config: EngineConfig,
    prices: &[Decimal],
    quote: Decimal,
    base: Decimal,
) -> Harness {
    let paper = Arc::new(PaperExchange::new(&PaperConfig {
        quote_balance: quote,
        base_balance: base,
    }));
    let feed = Arc::new(MockPriceFeed::new());
    for &price in prices {
        feed.push_price(p(price));
    }
    let engine = Engine::new(config, feed.clone(), paper.clone()).unwrap();
    Harness {
        engine,
        paper,
        feed,
    }
}

fn own_prices(paper: &PaperExchange, side: Side) -> Vec<Price> {
    paper.own_orders(side).iter().map(|o| o.price).collect()
}

/// Paper venue with scripted faults layered on top.
struct FaultyExchange {
    inner: Arc<PaperExchange>,
    /// Fail one open-orders read once this many placements went through.
    fail_reads_at: Mutex<Option<usize>>,
    /// Reject any placement at this side and price.
    reject: Mutex<Option<(Side, Price)>>,
}

impl FaultyExchange {
    fn new(inner: Arc<PaperExchange>) -> Self {
        Self {
            inner,
            fail_reads_at: Mutex::new(None),
            reject: Mutex::new(None),
        }
    }

    fn fail_open_orders_at(&self, placements: usize) {
        *self.fail_reads_at.lock() = Some(placements);
    }

    fn reject_at(&self, side: Side, price: Price) {
        *self.reject.lock() = Some((side, price));
    }
}

impl ExchangeAdapter for FaultyExchange {
    fn place_limit_order(
        &self,
        side: Side,
        price: Price,
        quantity: Size,
    ) -> BoxFuture<'_, AdapterResult<OrderId>> {
        if *self.reject.lock() == Some((side, price)) {
            return Box::pin(async move {
                Err(AdapterError::Rejected(format!("{side} at {price}")))
            });
        }
        self.inner.place_limit_order(side, price, quantity)
    }

    fn cancel_order<'a>(&'a self, order_id: &'a OrderId) -> BoxFuture<'a, AdapterResult<bool>> {
        self.inner.cancel_order(order_id)
    }

    fn cancel_all(&self) -> BoxFuture<'_, AdapterResult<(usize, usize)>> {
        self.inner.cancel_all()
    }

    fn read_open_orders(&self, side: Side) -> BoxFuture<'_, AdapterResult<Vec<OpenOrder>>> {
        let mut armed = self.fail_reads_at.lock();
        if *armed == Some(self.inner.placements().len()) {
            *armed = None;
            return Box::pin(async { Err(AdapterError::Unavailable("open orders".to_string())) });
        }
        drop(armed);
        self.inner.read_open_orders(side)
    }

    fn read_order_book(&self, side: Side) -> BoxFuture<'_, AdapterResult<Vec<BookLevel>>> {
        self.inner.read_order_book(side)
    }

    fn get_available_balance(&self, side: Side) -> BoxFuture<'_, AdapterResult<Decimal>> {
        self.inner.get_available_balance(side)
    }
}

fn faulty_engine(config: EngineConfig) -> (Engine, Arc<FaultyExchange>, Arc<PaperExchange>) {
    let paper = Arc::new(PaperExchange::new(&PaperConfig {
        quote_balance: dec!(10000),
        base_balance: dec!(100),
    }));
    let venue = Arc::new(FaultyExchange::new(paper.clone()));
    let feed = Arc::new(MockPriceFeed::constant(p(dec!(100))));
    let engine = Engine::new(config, feed, venue.clone()).unwrap();
    (engine, venue, paper)
}

#[tokio::test(start_paused = true)]
async fn test_initial_tick_builds_bid_quote() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[dec!(100)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();

    // Anchor at the reference, ladder one step at a time below it.
    assert_eq!(
        own_prices(&h.paper, Side::Bid),
        vec![p(dec!(100)), p(dec!(99)), p(dec!(98.01))]
    );
    assert!(h.paper.own_orders(Side::Ask).is_empty());

    let placements = h.paper.placements();
    assert_eq!(placements.len(), 5);
    assert_eq!(placements[0].side, Side::Ask, "bait goes first on the opposite side");
    assert_eq!(placements[2].quantity, Size::new(dec!(2)), "anchor takes 20% of 1000 at 100");

    let state = h.engine.state();
    assert_eq!(state.anchor_price(), Some(p(dec!(100))));
    assert_eq!(state.prev_anchor_price(), Some(p(dec!(100))));
    assert!(state.last_rebalance().is_some());
    assert!(state.is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_favorable_move_refills_only() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[dec!(100), dec!(99.9)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();
    let placed_before = h.paper.placements().len();

    tokio::time::advance(Duration::from_secs(60)).await;
    let outcome = h.engine.sync_with_reference().await.unwrap();

    assert_eq!(outcome, SyncOutcome::Refilled);
    assert_eq!(h.engine.state().anchor_price(), Some(p(dec!(99.9))));
    assert_eq!(h.engine.state().prev_anchor_price(), Some(p(dec!(99.9))));
    // Book was full: nothing new submitted.
    assert_eq!(h.paper.placements().len(), placed_before);
}

#[tokio::test(start_paused = true)]
async fn test_adverse_move_reanchors_and_trims_stale_level() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[dec!(100), dec!(101)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();

    tokio::time::advance(Duration::from_secs(60)).await;
    h.engine.tick().await.unwrap();

    assert_eq!(h.engine.state().anchor_price(), Some(p(dec!(101))));
    // New anchor at 101; the farthest old level was trimmed.
    assert_eq!(
        own_prices(&h.paper, Side::Bid),
        vec![p(dec!(101)), p(dec!(100)), p(dec!(99))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rebalance_waits_for_interval() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[dec!(100), dec!(105)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();
    assert_eq!(h.feed.calls(), 1);

    tokio::time::advance(Duration::from_secs(59)).await;
    h.engine.tick().await.unwrap();
    assert_eq!(h.feed.calls(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    h.engine.tick().await.unwrap();
    assert_eq!(h.feed.calls(), 2);
    assert_eq!(h.engine.state().anchor_price(), Some(p(dec!(105))));
}

#[tokio::test(start_paused = true)]
async fn test_empty_book_rebalances_regardless_of_direction() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[dec!(100), dec!(99)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();
    h.paper.cancel_all().await.unwrap();

    tokio::time::advance(Duration::from_secs(60)).await;
    let outcome = h.engine.sync_with_reference().await.unwrap();

    assert_eq!(outcome, SyncOutcome::Rebalanced(RebalanceReason::EmptyBook));
    assert_eq!(
        own_prices(&h.paper, Side::Bid),
        vec![p(dec!(99)), p(dec!(98.01)), p(dec!(97.0299))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_refill_timer_extends_beyond_outermost() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[dec!(100)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();

    // An external seller takes out the two nearest levels.
    let near: Size = h.paper.own_orders(Side::Bid)[..2]
        .iter()
        .map(|o| o.quantity)
        .sum();
    h.paper.seed(Side::Ask, p(dec!(99)), near).unwrap();
    assert_eq!(own_prices(&h.paper, Side::Bid), vec![p(dec!(98.01))]);
    let committed: Decimal = h.paper.own_orders(Side::Bid).iter().map(|o| o.notional()).sum();

    tokio::time::advance(Duration::from_secs(10)).await;
    h.engine.tick().await.unwrap();

    let orders = h.paper.own_orders(Side::Bid);
    let prices: Vec<_> = orders.iter().map(|o| o.price).collect();
    assert_eq!(prices, vec![p(dec!(98.01)), p(dec!(97.0299)), p(dec!(96.059601))]);

    let new_notional: Decimal = orders[1..].iter().map(|o| o.notional()).sum();
    assert!(new_notional <= dec!(1000) - committed);
    // Anchor did not move.
    assert_eq!(h.engine.state().anchor_price(), Some(p(dec!(100))));
    assert!(h.engine.state().last_refill().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_ask_engine_quotes_above_reference() {
    let mut h = harness(config(EngineMode::Single(Side::Ask)), &[dec!(100)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();

    assert_eq!(
        own_prices(&h.paper, Side::Ask),
        vec![p(dec!(100)), p(dec!(101)), p(dec!(102.01))]
    );
    // Fixed 1000 at 100 is 10 base; the anchor holds 20% of it.
    assert_eq!(h.paper.own_orders(Side::Ask)[0].quantity, Size::new(dec!(2)));
    assert!(h.paper.own_orders(Side::Bid).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dual_initial_quote_straddles_reference() {
    // One price for the startup balance check, one for the first tick.
    let mut h = harness(config(EngineMode::Dual), &[dec!(100), dec!(100)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();

    assert_eq!(
        own_prices(&h.paper, Side::Bid),
        vec![p(dec!(99.5)), p(dec!(98.505)), p(dec!(97.51995))]
    );
    assert_eq!(
        own_prices(&h.paper, Side::Ask),
        vec![p(dec!(100.5)), p(dec!(101.505)), p(dec!(102.52005))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dual_move_beyond_threshold_rebalances() {
    let mut h = harness(config(EngineMode::Dual), &[dec!(100), dec!(100), dec!(100.5)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();

    tokio::time::advance(Duration::from_secs(60)).await;
    let outcome = h.engine.sync_with_reference().await.unwrap();

    assert_eq!(outcome, SyncOutcome::Rebalanced(RebalanceReason::Threshold));
    assert_eq!(h.engine.state().anchor_price(), Some(p(dec!(100.5))));

    let bids = own_prices(&h.paper, Side::Bid);
    let asks = own_prices(&h.paper, Side::Ask);
    assert_eq!(bids[0], p(dec!(99.9975)));
    assert!(bids.len() <= 3 && asks.len() <= 3);
    assert!(asks[0] > bids[0], "own quotes must not cross");
}

#[tokio::test(start_paused = true)]
async fn test_dual_small_move_refills_only() {
    let mut h = harness(config(EngineMode::Dual), &[dec!(100), dec!(100), dec!(99.9)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();
    let placed_before = h.paper.placements().len();

    tokio::time::advance(Duration::from_secs(60)).await;
    let outcome = h.engine.sync_with_reference().await.unwrap();

    assert_eq!(outcome, SyncOutcome::Refilled);
    assert_eq!(h.engine.state().anchor_price(), Some(p(dec!(99.9))));
    assert_eq!(h.paper.placements().len(), placed_before);
}

#[tokio::test(start_paused = true)]
async fn test_dual_insufficient_balance_is_fatal_at_start() {
    let mut h = harness_with_balances(config(EngineMode::Dual), &[dec!(100)], dec!(1099), dec!(100));
    let err = h.engine.start().await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientBalance { side: Side::Bid, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_feed_failure_skips_tick_without_stamping() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[]);
    h.feed.push_error(FeedError::Unavailable("TESTUSDT".to_string()));
    h.engine.start().await.unwrap();

    h.engine.tick().await.unwrap();
    assert!(h.engine.state().anchor_price().is_none());
    assert!(h.engine.state().last_rebalance().is_none());
    assert!(h.paper.placements().is_empty());

    // Next poll tries again straight away.
    h.feed.push_price(p(dec!(100)));
    h.engine.tick().await.unwrap();
    assert_eq!(h.engine.state().anchor_price(), Some(p(dec!(100))));
}

#[tokio::test(start_paused = true)]
async fn test_bait_failure_aborts_and_waits_full_interval() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[dec!(100)]);
    h.engine.start().await.unwrap();
    h.paper.fail_next_placements(3);

    let outcome = h.engine.sync_with_reference().await.unwrap();
    assert_eq!(outcome, SyncOutcome::Aborted);
    assert!(h.engine.state().anchor_price().is_none());
    assert!(h.engine.state().last_rebalance().is_some());
    assert!(h.engine.state().is_idle());
    assert!(h.paper.placements().is_empty());

    h.engine.tick().await.unwrap();
    assert_eq!(h.feed.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ladder_fill_failure_still_adopts_anchor() {
    let (mut engine, venue, paper) = faulty_engine(config(EngineMode::Single(Side::Bid)));
    engine.start().await.unwrap();

    // Bait, sweep and anchor go through; the ladder read after them fails.
    venue.fail_open_orders_at(3);
    let outcome = engine.sync_with_reference().await.unwrap();

    assert_eq!(outcome, SyncOutcome::Rebalanced(RebalanceReason::Initial));
    assert_eq!(engine.state().anchor_price(), Some(p(dec!(100))));
    assert!(engine.state().last_rebalance().is_some());
    assert!(engine.state().is_idle());
    assert_eq!(own_prices(&paper, Side::Bid), vec![p(dec!(100))]);

    // The refill timer completes the ladder; no second bait or anchor.
    tokio::time::advance(Duration::from_secs(10)).await;
    engine.tick().await.unwrap();

    assert_eq!(
        own_prices(&paper, Side::Bid),
        vec![p(dec!(100)), p(dec!(99)), p(dec!(98.01))]
    );
    let at_anchor = paper
        .placements()
        .iter()
        .filter(|o| o.price == p(dec!(100)))
        .count();
    assert_eq!(at_anchor, 3, "bait, sweep and anchor only once");
}

#[tokio::test(start_paused = true)]
async fn test_dual_bait_failure_skips_only_that_side() {
    let (mut engine, venue, paper) = faulty_engine(config(EngineMode::Dual));
    engine.start().await.unwrap();

    // Ask-side bait is a bid at the ask target.
    venue.reject_at(Side::Bid, p(dec!(100.5)));
    let outcome = engine.sync_with_reference().await.unwrap();

    assert_eq!(outcome, SyncOutcome::Rebalanced(RebalanceReason::Initial));
    assert_eq!(engine.state().anchor_price(), Some(p(dec!(100))));
    assert_eq!(
        own_prices(&paper, Side::Bid),
        vec![p(dec!(99.5)), p(dec!(98.505)), p(dec!(97.51995))]
    );
    assert!(paper.own_orders(Side::Ask).is_empty());

    // The skipped side is laddered by the refill timer around the anchor.
    tokio::time::advance(Duration::from_secs(10)).await;
    engine.tick().await.unwrap();

    assert_eq!(
        own_prices(&paper, Side::Ask),
        vec![p(dec!(101.505)), p(dec!(102.52005)), p(dec!(103.5452505))]
    );
    assert_eq!(own_prices(&paper, Side::Bid).len(), 3);
    assert_eq!(engine.state().anchor_price(), Some(p(dec!(100))));
}

#[tokio::test(start_paused = true)]
async fn test_dual_downward_move_does_not_hit_own_bids() {
    let mut h = harness(config(EngineMode::Dual), &[dec!(100), dec!(100), dec!(99.5)]);
    h.engine.start().await.unwrap();
    h.engine.tick().await.unwrap();
    let fills_before = h.paper.fill_count();

    tokio::time::advance(Duration::from_secs(60)).await;
    let outcome = h.engine.sync_with_reference().await.unwrap();
    assert_eq!(outcome, SyncOutcome::Rebalanced(RebalanceReason::Threshold));

    // One bait/sweep match per side and nothing else.
    assert_eq!(h.paper.fill_count() - fills_before, 2);
    // The old 99.5 anchor was pulled, not traded into by the new bait.
    let bids = own_prices(&h.paper, Side::Bid);
    assert_eq!(bids, vec![p(dec!(99.0025)), p(dec!(98.505)), p(dec!(97.51995))]);
    let asks = own_prices(&h.paper, Side::Ask);
    assert_eq!(asks[0], p(dec!(99.9975)));
    assert!(asks.len() <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_startup_clears_leftover_orders() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[dec!(100)]);
    h.paper
        .place_limit_order(Side::Bid, p(dec!(90)), Size::new(dec!(1)))
        .await
        .unwrap();

    h.engine.start().await.unwrap();
    assert!(h.paper.own_orders(Side::Bid).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_consistency_error() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[dec!(100)]);
    h.paper
        .place_limit_order(Side::Bid, p(dec!(90)), Size::new(dec!(1)))
        .await
        .unwrap();
    h.paper.set_sticky_orders(true);

    let err = h.engine.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::Consistency(_)));
    assert_eq!(h.paper.placements().len(), 1, "no quoting after a failed cleanup");
}

#[tokio::test(start_paused = true)]
async fn test_run_until_cancelled() {
    let mut h = harness(config(EngineMode::Single(Side::Bid)), &[dec!(100)]);
    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        stop.cancel();
    });

    h.engine.run(cancel).await.unwrap();

    assert_eq!(h.engine.state().anchor_price(), Some(p(dec!(100))));
    assert_eq!(own_prices(&h.paper, Side::Bid).len(), 3);
    // One rebalance in 30 seconds.
    assert_eq!(h.feed.calls(), 1);
}
