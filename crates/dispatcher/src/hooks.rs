//! Strategy callbacks supplied at configuration time
//!
//! Every hook is invoked synchronously and should return quickly.

use std::fmt;
use std::sync::Arc;

use contracts::Record;

use crate::error::EngineError;

/// Decides drop (`true`) vs block (`false`) when the intake queue is full
pub type QueueFullFn = dyn Fn(&Record, usize) -> bool + Send + Sync;

/// Same decision surfaced per target, for targets with their own queue
pub type TargetQueueFullFn = dyn Fn(&str, &Record, usize) -> bool + Send + Sync;

/// Receives every internally detected failure
pub type ErrorFn = dyn Fn(&EngineError) + Send + Sync;

/// Replaces process exit for fatal-style log calls
pub type ExitFn = dyn Fn(i32) + Send + Sync;

/// Replaces the panic for panic-style log calls
pub type PanicFn = dyn Fn(&str) + Send + Sync;

/// Optional callbacks; `None` selects the documented default
#[derive(Clone, Default)]
pub struct Hooks {
    /// Default: block (never drop)
    pub on_queue_full: Option<Arc<QueueFullFn>>,
    /// Default: block (never drop)
    pub on_target_queue_full: Option<Arc<TargetQueueFullFn>>,
    /// Default: emit through `tracing::error!`
    pub on_error: Option<Arc<ErrorFn>>,
    /// Default: shut the engine down, then `std::process::exit(code)`
    pub on_exit: Option<Arc<ExitFn>>,
    /// Default: shut the engine down, then panic with the message
    pub on_panic: Option<Arc<PanicFn>>,
}

impl Hooks {
    pub(crate) fn queue_full(&self, rec: &Record, capacity: usize) -> bool {
        self.on_queue_full
            .as_ref()
            .is_some_and(|f| f(rec, capacity))
    }

    pub(crate) fn target_queue_full(&self, target: &str, rec: &Record, capacity: usize) -> bool {
        self.on_target_queue_full
            .as_ref()
            .is_some_and(|f| f(target, rec, capacity))
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_queue_full", &self.on_queue_full.is_some())
            .field("on_target_queue_full", &self.on_target_queue_full.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .field("on_panic", &self.on_panic.is_some())
            .finish()
    }
}
