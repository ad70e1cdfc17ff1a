//! Ladder quoting engine.
//!
//! Keeps a geometric ladder of resting limit orders on one or both sides
//! of a venue's book, re-anchored to an external reference price:
//!
//! - `planner` / `allocator`: pure price and size computation
//! - `sequencer`: bait, sweep, anchor when moving the quote
//! - `policy`: full rebalance versus refill-only
//! - `maintenance`: excess trimming, top-up, startup cleanup
//! - `engine`: timers and the control loop

pub mod allocator;
pub mod budget;
pub mod config;
pub mod engine;
pub mod error;
pub mod maintenance;
pub mod planner;
pub mod policy;
pub mod sequencer;
pub mod state;

pub use allocator::BudgetAllocator;
pub use budget::{BalanceSnapshot, INITIAL_BALANCE_BUFFER};
pub use config::{DistributionMode, EngineConfig, EngineMode, EngineTiming, PriceJitter, SideBudget};
pub use engine::{quoted_price, Engine, SyncOutcome};
pub use error::{EngineError, EngineResult};
pub use planner::LadderPlanner;
pub use policy::{decide, BookOccupancy, Decision, RebalanceReason};
pub use sequencer::{OrderRole, OrderSequencer, SequenceOutcome, SweepAbort};
pub use state::{AnchorState, EnginePhase};
