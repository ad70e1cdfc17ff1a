//! Prometheus metrics and structured logging for the ladder market maker.
//!
//! - Prometheus counters for rebalances, refills, placements, and cancels
//! - Structured logging with tracing (pretty or JSON)
//! - Session summary on shutdown

pub mod error;
pub mod logging;
pub mod metrics;
pub mod stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use stats::{SessionStats, SessionStatsReporter};
