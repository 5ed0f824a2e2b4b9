//! Metrics capability contract
//!
//! The engine only needs settable gauges and monotonic counters; the backend
//! behind them is supplied by the host application.

use std::sync::Arc;

use crate::ContractError;

/// Settable numeric value
pub trait Gauge: Send + Sync {
    fn set(&self, value: f64);
}

/// Monotonic counter
pub trait Counter: Send + Sync {
    fn inc(&self) {
        self.add(1);
    }

    fn add(&self, n: u64);
}

/// Factory for per-target metric handles
///
/// Each accessor is keyed by a target name. The engine registers its own
/// handles under [`ENGINE_METRICS_NAME`].
pub trait MetricsCollector: Send + Sync {
    fn queue_size_gauge(&self, target: &str) -> Result<Arc<dyn Gauge>, ContractError>;

    fn logged_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError>;

    fn error_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError>;

    fn dropped_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError>;

    fn blocked_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError>;
}

/// Target name used for the engine's own metrics
pub const ENGINE_METRICS_NAME: &str = "_logfan";
