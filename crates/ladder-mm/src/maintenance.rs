//! Book upkeep: excess trimming, ladder top-up, startup cleanup.

use ladder_core::{retry, OpenOrder, Price, Side};
use ladder_telemetry::Metrics;
use tracing::{debug, error, info, warn};

use crate::allocator::BudgetAllocator;
use crate::budget::{ladder_budget, BalanceSnapshot};
use crate::error::{EngineError, EngineResult};
use crate::planner::LadderPlanner;
use crate::sequencer::OrderSequencer;

/// Cancel resting orders beyond the configured level count, farthest from
/// the touch first, at most `max_cancel_ops_per_cycle` cancel calls.
///
/// Returns the number of orders actually removed. Whatever excess remains
/// is left for the next cycle.
pub async fn trim_excess(seq: &OrderSequencer, side: Side) -> EngineResult<usize> {
    let mut resting = seq.exchange().read_open_orders(side).await?;
    let levels = seq.config().levels as usize;
    if resting.len() <= levels {
        return Ok(0);
    }

    sort_nearest_first(side, &mut resting);
    let excess = resting.len() - levels;
    let max_ops = seq.config().max_cancel_ops_per_cycle as usize;
    let timeout = seq.config().cancel_timeout();
    info!(side = %side, resting = resting.len(), levels, excess, max_ops, "Trimming excess orders");

    let mut removed = 0;
    for order in resting[levels..].iter().rev().take(max_ops) {
        let outcome = match tokio::time::timeout(timeout, seq.exchange().cancel_order(&order.order_id)).await
        {
            Ok(Ok(true)) => {
                removed += 1;
                "cancelled"
            }
            Ok(Ok(false)) => "missing",
            Ok(Err(e)) => {
                warn!(side = %side, order_id = %order.order_id, error = %e, "Cancel failed");
                "failed"
            }
            Err(_) => {
                warn!(
                    side = %side,
                    order_id = %order.order_id,
                    timeout_sec = timeout.as_secs(),
                    "Cancel timed out"
                );
                "timeout"
            }
        };
        Metrics::cancel(seq.ticker(), side.as_str(), outcome);
        debug!(side = %side, price = %order.price, outcome, "[TRIM]");
    }

    if removed < excess {
        debug!(side = %side, remaining = excess - removed, "Excess left for next cycle");
    }
    Ok(removed)
}

/// Bring `side` back up to the configured level count.
///
/// An empty side gets a full ladder stepping away from `from`. Otherwise
/// the missing levels extend outward from the outermost resting order.
/// New levels share whatever is left of the side's ladder budget after
/// the committed amount. Over-full sides are trimmed instead when
/// excess removal is enabled.
///
/// Returns the number of orders placed.
pub async fn top_up(
    seq: &OrderSequencer,
    planner: &LadderPlanner,
    allocator: &BudgetAllocator,
    side: Side,
    from: Price,
    reference: Price,
) -> EngineResult<usize> {
    let config = seq.config();
    let levels = config.levels as usize;
    let resting = seq.exchange().read_open_orders(side).await?;
    let count = resting.len();

    if count > levels {
        if config.excess_order_removal {
            trim_excess(seq, side).await?;
        }
        return Ok(0);
    }
    if count == levels {
        debug!(side = %side, count, "Ladder full");
        return Ok(0);
    }

    let prices = if resting.is_empty() {
        planner.ladder(side, from, levels)
    } else {
        let occupied: Vec<Price> = resting.iter().map(|o| o.price).collect();
        planner.extension(side, &occupied, levels - count)
    };
    if prices.is_empty() {
        warn!(side = %side, "No ladder prices available");
        return Ok(0);
    }

    let available = seq.exchange().get_available_balance(side).await?;
    let snapshot = BalanceSnapshot::new(side, available, &resting);
    let total = config.budget(side).total(side, reference, snapshot);
    let budget = ladder_budget(total, config.anchor_budget_ratio, snapshot);
    if budget.is_zero() {
        warn!(
            side = %side,
            %total,
            committed = %snapshot.committed,
            available = %snapshot.available,
            "No ladder budget left - skip"
        );
        return Ok(0);
    }

    let ladder = allocator.allocate(side, &prices, budget);
    info!(
        side = %side,
        existing = count,
        new_levels = ladder.len(),
        %budget,
        "Filling ladder"
    );
    Ok(seq.place_ladder(&ladder).await)
}

/// Cancel everything before the first rebalance and verify the book is
/// clear.
///
/// # Errors
/// `EngineError::Consistency` if orders remain after every attempt.
pub async fn startup_cleanup(seq: &OrderSequencer) -> EngineResult<()> {
    let timing = &seq.config().timing;
    tokio::time::sleep(timing.startup_settle()).await;

    let policy = timing.cleanup_retry_policy();
    let result = retry(
        &policy,
        "startup-cleanup",
        |attempt| async move {
            let (cancelled, total) = seq.exchange().cancel_all().await?;
            info!(attempt, cancelled, total, "Cleanup attempt");
            if cancelled < total {
                return Err(EngineError::Consistency(format!(
                    "{} of {total} orders could not be cancelled",
                    total - cancelled
                )));
            }
            Ok::<_, EngineError>(total)
        },
        |_| true,
    )
    .await;

    let total = result.map_err(|e| {
        error!(error = %e, "Startup cleanup failed");
        match e {
            EngineError::Consistency(_) => e,
            other => EngineError::Consistency(format!("cleanup did not complete: {other}")),
        }
    })?;

    let mut remaining = 0;
    for side in Side::BOTH {
        let open = seq
            .exchange()
            .read_open_orders(side)
            .await
            .map_err(|e| EngineError::Consistency(format!("open orders unreadable after cleanup: {e}")))?;
        remaining += open.len();
    }
    if remaining > 0 {
        error!(remaining, "Orders remain after cleanup");
        return Err(EngineError::Consistency(format!(
            "{remaining} orders remain after cleanup"
        )));
    }

    info!(cancelled = total, "Startup cleanup complete");
    Ok(())
}

fn sort_nearest_first(side: Side, orders: &mut [OpenOrder]) {
    orders.sort_by(|a, b| match side {
        Side::Bid => b.price.cmp(&a.price),
        Side::Ask => a.price.cmp(&b.price),
    });
}
