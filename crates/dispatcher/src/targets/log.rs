//! TracingTarget - forwards records to the `tracing` subscriber

use std::fmt::Write;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use contracts::{ContractError, Level, LevelStatus, LogRec, Record, StdFilter, Target};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::buffer_pool::BufferPool;

/// Target that re-emits records as tracing events
///
/// Do not install it when the tracing subscriber itself feeds the engine.
pub struct TracingTarget {
    name: String,
    filter: RwLock<StdFilter>,
    buffers: Arc<BufferPool>,
}

impl TracingTarget {
    /// Create a new TracingTarget with the given name and filter
    pub fn new(name: impl Into<String>, filter: StdFilter) -> Self {
        Self {
            name: name.into(),
            filter: RwLock::new(filter),
            buffers: Arc::new(BufferPool::new(4096, false)),
        }
    }

    /// Render fields with buffers from a shared pool
    pub fn with_buffer_pool(mut self, buffers: Arc<BufferPool>) -> Self {
        self.buffers = buffers;
        self
    }

    pub fn filter(&self) -> StdFilter {
        *self.filter.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the filter
    ///
    /// Follow with `Engine::reset_level_cache` so cached decisions are dropped.
    pub fn set_filter(&self, filter: StdFilter) {
        *self.filter.write().unwrap_or_else(PoisonError::into_inner) = filter;
    }

    fn emit(&self, rec: &Record) {
        let payload = rec.payload();

        let mut buf = self.buffers.borrow_guard();
        for field in &payload.fields {
            let _ = write!(buf, "{}={} ", field.key, field.value);
        }
        let fields = String::from_utf8_lossy(&buf);
        let fields = fields.trim_end();
        let stacktrace = payload.stacktrace.as_deref();
        let sink = self.name.as_str();

        macro_rules! event {
            ($mac:ident) => {
                $mac!(
                    target: "logfan",
                    sink,
                    level = %rec.level(),
                    time = %rec.time(),
                    fields,
                    stacktrace,
                    "{}",
                    rec.msg()
                )
            };
        }

        match rec.level().id() {
            0..=2 => event!(error),
            3 => event!(warn),
            4 => event!(info),
            5 => event!(debug),
            _ => event!(trace),
        }
    }
}

impl Target for TracingTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_level_enabled(&self, level: Level) -> LevelStatus {
        self.filter().status(level)
    }

    fn log(&self, rec: LogRec) {
        match rec {
            // Events are written synchronously, nothing is buffered
            LogRec::Flush(signal) => signal.complete(),
            LogRec::Data(rec) => self.emit(&rec),
        }
    }

    #[instrument(name = "tracing_target_shutdown", skip(self, _deadline))]
    fn shutdown(&self, _deadline: Instant) -> Result<(), ContractError> {
        info!(sink = %self.name, "TracingTarget closed");
        Ok(())
    }
}
