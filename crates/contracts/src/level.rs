//! Severity levels and level filters

use serde::Serialize;

/// Highest level id (exclusive) the array-backed level cache can hold
pub const MAX_LEVEL_ID: u32 = 256;

/// A named severity
///
/// Immutable once defined. Custom levels can be created with [`Level::new`];
/// the id is what caches and filters compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Level {
    id: u32,
    name: &'static str,
    stacktrace: bool,
}

impl Level {
    /// Define a level
    pub const fn new(id: u32, name: &'static str, stacktrace: bool) -> Self {
        Self {
            id,
            name,
            stacktrace,
        }
    }

    /// Numeric id (lower is more severe for the standard levels)
    #[inline]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether records at this level should capture a stack trace
    #[inline]
    pub const fn stacktrace(&self) -> bool {
        self.stacktrace
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

pub const PANIC: Level = Level::new(0, "panic", true);
pub const FATAL: Level = Level::new(1, "fatal", true);
pub const ERROR: Level = Level::new(2, "error", false);
pub const WARN: Level = Level::new(3, "warn", false);
pub const INFO: Level = Level::new(4, "info", false);
pub const DEBUG: Level = Level::new(5, "debug", false);
pub const TRACE: Level = Level::new(6, "trace", false);

/// Cached answer to "does any target accept this level, and does any
/// accepting target want a stack trace"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelStatus {
    pub enabled: bool,
    pub stacktrace: bool,
}

impl LevelStatus {
    pub const DISABLED: LevelStatus = LevelStatus {
        enabled: false,
        stacktrace: false,
    };

    pub const fn new(enabled: bool, stacktrace: bool) -> Self {
        Self {
            enabled,
            stacktrace,
        }
    }
}

/// Threshold filter used by most targets
///
/// A level is enabled when its id is at most `level.id()`, and wants a
/// stack trace when its id is at most `stacktrace.id()` or the level itself
/// is flagged for traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdFilter {
    pub level: Level,
    pub stacktrace: Level,
}

impl StdFilter {
    pub const fn new(level: Level, stacktrace: Level) -> Self {
        Self { level, stacktrace }
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        level.id() <= self.level.id()
    }

    pub fn is_stacktrace_enabled(&self, level: Level) -> bool {
        level.stacktrace() || level.id() <= self.stacktrace.id()
    }

    /// Combined status; a trace is only requested for enabled levels
    pub fn status(&self, level: Level) -> LevelStatus {
        let enabled = self.is_enabled(level);
        LevelStatus::new(enabled, enabled && self.is_stacktrace_enabled(level))
    }
}

impl Default for StdFilter {
    fn default() -> Self {
        Self::new(INFO, PANIC)
    }
}
