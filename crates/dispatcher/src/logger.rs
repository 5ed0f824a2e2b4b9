//! Logger - lightweight handle bound to one engine

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use contracts::{Field, Level, LevelStatus, LogRec, Record, DEBUG, ERROR, FATAL, INFO, PANIC, TRACE, WARN};

use crate::engine::Engine;

/// Logging handle
///
/// Cheap to create per call site or per request. Carries context fields
/// that are merged into every record it produces.
#[derive(Clone)]
pub struct Logger {
    engine: Engine,
    fields: Arc<[Field]>,
}

impl Logger {
    pub(crate) fn new(engine: Engine) -> Self {
        Self {
            engine,
            fields: Arc::from(Vec::new()),
        }
    }

    /// New logger with `fields` appended to this logger's context
    pub fn with_fields(&self, fields: impl IntoIterator<Item = Field>) -> Self {
        let merged: Vec<Field> = self.fields.iter().cloned().chain(fields).collect();
        Self {
            engine: self.engine.clone(),
            fields: Arc::from(merged),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn is_level_enabled(&self, level: Level) -> bool {
        self.engine.is_level_enabled(level).enabled
    }

    pub fn log(&self, level: Level, msg: impl Into<String>) {
        self.log_with(level, msg, Vec::new());
    }

    /// Log with call-site fields; nothing is built when the level is disabled
    pub fn log_with(&self, level: Level, msg: impl Into<String>, fields: Vec<Field>) {
        let status = self.engine.is_level_enabled(level);
        if !status.enabled {
            return;
        }
        self.engine
            .enqueue(LogRec::data(self.record(level, msg.into(), fields, status)));
    }

    /// Log preformatted arguments, formatting only when the level is enabled
    ///
    /// ```ignore
    /// logger.logf(INFO, format_args!("accepted {} connections", n));
    /// ```
    pub fn logf(&self, level: Level, args: fmt::Arguments<'_>) {
        let status = self.engine.is_level_enabled(level);
        if !status.enabled {
            return;
        }
        self.engine
            .enqueue(LogRec::data(self.record(level, fmt::format(args), Vec::new(), status)));
    }

    pub fn trace(&self, msg: impl Into<String>) {
        self.log(TRACE, msg);
    }

    pub fn debug(&self, msg: impl Into<String>) {
        self.log(DEBUG, msg);
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.log(INFO, msg);
    }

    pub fn warn(&self, msg: impl Into<String>) {
        self.log(WARN, msg);
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.log(ERROR, msg);
    }

    /// Log at FATAL, then run the exit hook with code 1
    pub fn fatal(&self, msg: impl Into<String>) {
        self.log(FATAL, msg);
        self.engine.exit(1);
    }

    /// Log at PANIC, then run the panic hook
    pub fn panic(&self, msg: impl Into<String>) {
        let msg = msg.into();
        self.log(PANIC, msg.clone());
        self.engine.panic(&msg);
    }

    fn record(&self, level: Level, msg: String, fields: Vec<Field>, status: LevelStatus) -> Record {
        let rec = Record::new(level, msg)
            .with_context(Arc::clone(&self.fields))
            .with_fields(fields);
        // Captured here, at the call site, not on the consumer thread
        if status.stacktrace {
            rec.with_backtrace(Backtrace::force_capture())
        } else {
            rec
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
