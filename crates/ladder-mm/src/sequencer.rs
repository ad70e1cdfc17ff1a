//! Bait, sweep, anchor.
//!
//! Re-establishing a quote at a new target price without resting a large
//! order straight into crossable liquidity:
//!
//! 0. Own orders on the side at or better than the target are cancelled.
//! 1. Bait: a minimum-notional order on the opposite side at the target.
//! 2. Scan: opposite-side book levels better than the target are blocking.
//! 3. Balance check: bait plus blocking quantity must fit the side budget.
//! 4. Sweep: one own-side order at the target for that aggregate quantity.
//! 5. Anchor: the durable own-side quote at the target, funded by
//!    `anchor_budget_ratio` of the side budget.
//!
//! A failed bait aborts the step for that side. Anything after it degrades: the step is
//! logged and the bait withdrawn, but the engine carries on.

use std::fmt;
use std::sync::Arc;

use ladder_core::{retry, BookLevel, LadderLevel, OrderId, Price, Side, Size};
use ladder_exchange::{AdapterError, AdapterResult, DynExchange, ExchangeAdapter};
use ladder_telemetry::Metrics;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::budget::{anchor_amount, required_amount, to_quantity, BalanceSnapshot};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Purpose of a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRole {
    Bait,
    Sweep,
    Anchor,
    Ladder,
}

impl OrderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bait => "bait",
            Self::Sweep => "sweep",
            Self::Anchor => "anchor",
            Self::Ladder => "ladder",
        }
    }
}

impl fmt::Display for OrderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a sweep was not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepAbort {
    /// Opposite book or own balance could not be read.
    ReadFailed,
    /// Required amount exceeds what the side may spend.
    InsufficientBalance {
        required: Decimal,
        allowance: Decimal,
    },
    /// Sweep submission failed after retries.
    SubmitFailed,
}

impl SweepAbort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadFailed => "read_failed",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::SubmitFailed => "sweep_failed",
        }
    }
}

/// Result of one bait/sweep/anchor pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// Sweep sent. `anchor` is `None` if the anchor order could not be
    /// sized or placed.
    Established {
        sweep_quantity: Size,
        anchor: Option<OrderId>,
    },
    /// Bait placed but the sweep was abandoned; no anchor order.
    SweepAbandoned(SweepAbort),
}

/// Sole submitter of orders for one engine.
pub struct OrderSequencer {
    exchange: DynExchange,
    config: Arc<EngineConfig>,
    ticker: String,
}

impl OrderSequencer {
    pub fn new(exchange: DynExchange, config: Arc<EngineConfig>, ticker: impl Into<String>) -> Self {
        Self {
            exchange,
            config,
            ticker: ticker.into(),
        }
    }

    pub fn exchange(&self) -> &dyn ExchangeAdapter {
        self.exchange.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Submit one order with the configured retry cap and settle pause.
    pub async fn submit(
        &self,
        role: OrderRole,
        side: Side,
        price: Price,
        quantity: Size,
    ) -> AdapterResult<OrderId> {
        let price = price.normalize();
        let quantity = quantity.normalize();
        let policy = self.config.timing.order_retry_policy();
        let label = format!("{}-{}", role.as_str(), side.as_str());

        let result = retry(
            &policy,
            &label,
            |_| self.exchange.place_limit_order(side, price, quantity),
            AdapterError::is_retryable,
        )
        .await;

        match result {
            Ok(order_id) => {
                Metrics::order_placed(&self.ticker, side.as_str(), role.as_str());
                debug!(%role, side = %side, %price, %quantity, %order_id, "Order placed");
                tokio::time::sleep(self.config.timing.settle_after_place()).await;
                Ok(order_id)
            }
            Err(e) => {
                Metrics::order_failed(&self.ticker, side.as_str(), role.as_str());
                error!(%role, side = %side, %price, %quantity, error = %e, "Order failed - skip");
                Err(e)
            }
        }
    }

    /// Place ladder levels in order. Failures skip that level only.
    ///
    /// Returns the number of levels placed.
    pub async fn place_ladder(&self, levels: &[LadderLevel]) -> usize {
        let mut placed = 0;
        for level in levels {
            info!(
                side = %level.side,
                price = %level.price,
                quantity = %level.quantity,
                notional = %level.notional().round_dp(2),
                "[LADDER]"
            );
            if self
                .submit(OrderRole::Ladder, level.side, level.price, level.quantity)
                .await
                .is_ok()
            {
                placed += 1;
            }
        }
        placed
    }

    /// Run bait, scan, balance check, sweep and anchor for `side` at
    /// `target`. `reference` is the raw reference price used to value
    /// fixed ask budgets.
    ///
    /// # Errors
    /// `EngineError::BaitFailed` if the bait cannot be placed. Every later
    /// failure is reported through the outcome instead.
    pub async fn establish(
        &self,
        side: Side,
        target: Price,
        reference: Price,
    ) -> EngineResult<SequenceOutcome> {
        let target = target.normalize();
        let bait_side = side.opposite();
        let bait_qty = Size::from_notional(self.config.min_order_notional, target).normalize();

        if !bait_qty.is_positive() {
            Metrics::rebalance_aborted(&self.ticker, side.as_str(), "bait_failed");
            return Err(EngineError::BaitFailed {
                side: bait_side,
                price: target,
                reason: "bait quantity rounds to zero".to_string(),
            });
        }

        self.withdraw_crossing(side, target).await;

        info!(side = %bait_side, price = %target, quantity = %bait_qty, "[BAIT]");
        if let Err(e) = self
            .submit(OrderRole::Bait, bait_side, target, bait_qty)
            .await
        {
            Metrics::rebalance_aborted(&self.ticker, side.as_str(), "bait_failed");
            return Err(EngineError::BaitFailed {
                side: bait_side,
                price: target,
                reason: e.to_string(),
            });
        }
        tokio::time::sleep(self.config.timing.settle_after_bait()).await;

        let blocking = match self.blocking_levels(bait_side, target).await {
            Ok(levels) => levels,
            Err(e) => {
                warn!(side = %bait_side, error = %e, "Order book read failed, sweep abandoned");
                return Ok(self.abandon(side, target, SweepAbort::ReadFailed).await);
            }
        };
        let sweep_qty = (bait_qty + blocking.iter().map(|l| l.quantity).sum::<Size>()).normalize();
        if !blocking.is_empty() {
            info!(
                side = %bait_side,
                count = blocking.len(),
                quantity = %sweep_qty,
                "[SWEEP] Found blocking orders"
            );
        }

        let budget = self.config.budget(side);
        let available = match self.exchange.get_available_balance(side).await {
            Ok(available) => available,
            Err(e) => {
                warn!(side = %side, error = %e, "Balance read failed, sweep abandoned");
                return Ok(self.abandon(side, target, SweepAbort::ReadFailed).await);
            }
        };
        let allowance = budget.sweep_allowance(side, reference, available);
        let required = required_amount(side, sweep_qty, target);
        if required > allowance {
            error!(
                side = %side,
                %required,
                %allowance,
                "[INSUFFICIENT] Sweep needs more than the side may spend"
            );
            return Ok(self
                .abandon(
                    side,
                    target,
                    SweepAbort::InsufficientBalance {
                        required,
                        allowance,
                    },
                )
                .await);
        }

        info!(side = %side, price = %target, quantity = %sweep_qty, "[SWEEP]");
        if self
            .submit(OrderRole::Sweep, side, target, sweep_qty)
            .await
            .is_err()
        {
            return Ok(self.abandon(side, target, SweepAbort::SubmitFailed).await);
        }

        let anchor = self.place_anchor(side, target, reference).await;
        if anchor.is_some() {
            info!(side = %side, price = %target, "Setup complete");
        }
        Ok(SequenceOutcome::Established {
            sweep_quantity: sweep_qty,
            anchor,
        })
    }

    /// Opposite-side levels priced better than `target`.
    async fn blocking_levels(&self, bait_side: Side, target: Price) -> AdapterResult<Vec<BookLevel>> {
        let book = self.exchange.read_order_book(bait_side).await?;
        Ok(book
            .into_iter()
            .filter(|level| bait_side.is_better(level.price, target))
            .collect())
    }

    async fn place_anchor(&self, side: Side, target: Price, reference: Price) -> Option<OrderId> {
        let snapshot = match self.balance_snapshot(side).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(side = %side, error = %e, "Anchor failed: balance unavailable");
                return None;
            }
        };
        let total = self.config.budget(side).total(side, reference, snapshot);
        let amount = anchor_amount(total, self.config.anchor_budget_ratio).min(snapshot.available);
        let quantity = to_quantity(side, amount, target);
        if !quantity.is_positive() {
            warn!(side = %side, %amount, "Anchor quantity rounds to zero - skip");
            return None;
        }

        info!(side = %side, price = %target, %quantity, "[ANCHOR]");
        self.submit(OrderRole::Anchor, side, target, quantity)
            .await
            .ok()
    }

    /// Free balance and committed amount for one side.
    pub async fn balance_snapshot(&self, side: Side) -> AdapterResult<BalanceSnapshot> {
        let resting = self.exchange.read_open_orders(side).await?;
        let available = self.exchange.get_available_balance(side).await?;
        Ok(BalanceSnapshot::new(side, available, &resting))
    }

    async fn abandon(&self, side: Side, target: Price, reason: SweepAbort) -> SequenceOutcome {
        Metrics::rebalance_aborted(&self.ticker, side.as_str(), reason.as_str());
        self.withdraw_bait(side.opposite(), target).await;
        SequenceOutcome::SweepAbandoned(reason)
    }

    /// Cancel own `bait_side` orders resting exactly at `target`.
    ///
    /// Best effort: failures are logged.
    async fn withdraw_bait(&self, bait_side: Side, target: Price) {
        self.cancel_own(bait_side, "Bait withdrawn", |price| price == target)
            .await;
    }

    /// Cancel own `side` orders at or better than `target`, which the bait
    /// would otherwise trade against.
    async fn withdraw_crossing(&self, side: Side, target: Price) {
        let removed = self
            .cancel_own(side, "Crossing order withdrawn", |price| {
                !side.is_farther(price, target)
            })
            .await;
        if removed > 0 {
            info!(side = %side, price = %target, removed, "Cleared own orders ahead of bait");
        }
    }

    /// Cancel own `side` orders whose price matches `select`. Returns the
    /// number removed.
    async fn cancel_own<F>(&self, side: Side, what: &str, select: F) -> usize
    where
        F: Fn(Price) -> bool,
    {
        let resting = match self.exchange.read_open_orders(side).await {
            Ok(resting) => resting,
            Err(e) => {
                warn!(side = %side, error = %e, "{what} skipped: open orders unavailable");
                return 0;
            }
        };
        let mut removed = 0;
        for order in resting.iter().filter(|o| select(o.price)) {
            match self.exchange.cancel_order(&order.order_id).await {
                Ok(true) => {
                    removed += 1;
                    Metrics::cancel(&self.ticker, side.as_str(), "cancelled");
                    info!(side = %side, price = %order.price, order_id = %order.order_id, "{what}");
                }
                Ok(false) => Metrics::cancel(&self.ticker, side.as_str(), "missing"),
                Err(e) => {
                    Metrics::cancel(&self.ticker, side.as_str(), "failed");
                    warn!(side = %side, order_id = %order.order_id, error = %e, "{what} failed");
                }
            }
        }
        removed
    }
}
