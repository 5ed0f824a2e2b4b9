//! Engine configuration contracts that can be shared across crates.
//!
//! A zero value in any numeric option selects the documented default, so a
//! partially filled config file behaves like `EngineConfig::default()`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_POOLED_BUFFER: usize = 1024 * 1024;
pub const DEFAULT_METRICS_UPDATE_FREQ: Duration = Duration::from_millis(15_000);
/// Polling floor for the metrics updater
pub const MIN_METRICS_UPDATE_FREQ: Duration = Duration::from_millis(250);

/// Engine options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// Intake queue capacity (0 = default, negative = no buffering)
    #[validate(range(max = 10_000_000))]
    pub max_queue_size: i64,

    /// Bound on a blocking enqueue after the overflow policy declined to drop
    #[validate(range(max = 3_600_000))]
    pub enqueue_timeout_ms: u64,

    /// Deadline for `Engine::shutdown`
    #[validate(range(max = 3_600_000))]
    pub shutdown_timeout_ms: u64,

    /// Deadline for `Engine::flush`
    #[validate(range(max = 3_600_000))]
    pub flush_timeout_ms: u64,

    /// Level cache implementation, fixed once the engine starts
    pub level_cache: LevelCacheKind,

    /// Largest buffer capacity returned to the pool (0 = default)
    #[validate(range(max = 1_073_741_824))]
    pub max_pooled_buffer: usize,

    /// Allocate a fresh buffer on every borrow
    pub disable_buffer_pool: bool,

    /// Metrics polling interval (0 = default, floored to 250ms)
    #[validate(range(max = 86_400_000))]
    pub metrics_update_freq_ms: u64,
}

impl EngineConfig {
    /// Resolved intake queue capacity
    pub fn queue_capacity(&self) -> usize {
        match self.max_queue_size {
            0 => DEFAULT_MAX_QUEUE_SIZE,
            n if n < 0 => 0,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        }
    }

    pub fn enqueue_timeout(&self) -> Duration {
        or_default(self.enqueue_timeout_ms, DEFAULT_ENQUEUE_TIMEOUT)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        or_default(self.shutdown_timeout_ms, DEFAULT_SHUTDOWN_TIMEOUT)
    }

    pub fn flush_timeout(&self) -> Duration {
        or_default(self.flush_timeout_ms, DEFAULT_FLUSH_TIMEOUT)
    }

    pub fn max_pooled_buffer(&self) -> usize {
        if self.max_pooled_buffer == 0 {
            DEFAULT_MAX_POOLED_BUFFER
        } else {
            self.max_pooled_buffer
        }
    }

    /// Resolved metrics interval, never below [`MIN_METRICS_UPDATE_FREQ`]
    pub fn metrics_update_freq(&self) -> Duration {
        or_default(self.metrics_update_freq_ms, DEFAULT_METRICS_UPDATE_FREQ)
            .max(MIN_METRICS_UPDATE_FREQ)
    }
}

fn or_default(ms: u64, default: Duration) -> Duration {
    if ms == 0 {
        default
    } else {
        Duration::from_millis(ms)
    }
}

/// Level cache implementation selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelCacheKind {
    /// Fixed-size array indexed by level id
    #[default]
    Array,
    /// Concurrent map, for sparse level ids or very high core counts
    Map,
}
