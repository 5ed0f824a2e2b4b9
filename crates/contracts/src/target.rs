//! Target trait - engine output interface
//!
//! Concrete targets (files, network shippers, formatters) live outside the
//! engine and are consumed only through this capability contract.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{ContractError, Level, LevelStatus, LogRec, MetricsCollector};

/// Output target
///
/// Targets are shared between the fan-out loop and level checks, so every
/// method takes `&self`; mutable state belongs behind interior mutability.
pub trait Target: Send + Sync {
    /// Target name (used for error tagging and metrics)
    fn name(&self) -> &str;

    /// Whether this target accepts `level`, and wants a stack trace for it
    ///
    /// Called on every level-cache miss and on every fan-out, so it must be
    /// cheap and side-effect free.
    fn is_level_enabled(&self, level: Level) -> LevelStatus;

    /// Accept one record
    ///
    /// A [`LogRec::Flush`] marker must be completed (or dropped) once every
    /// record the target accepted before it has been written out.
    fn log(&self, rec: LogRec);

    /// Shut down, returning no later than `deadline`
    ///
    /// # Errors
    /// Returns shutdown failure (should include context)
    fn shutdown(&self, deadline: Instant) -> Result<(), ContractError>;

    /// Optional metrics capability
    fn as_metrics_target(&self) -> Option<&dyn MetricsTarget> {
        None
    }
}

/// Targets that publish their own queue-depth or drop counters
pub trait MetricsTarget {
    fn enable_metrics(
        &self,
        collector: Arc<dyn MetricsCollector>,
        update_freq: Duration,
    ) -> Result<(), ContractError>;
}
