//! Engine metrics over the `metrics` facade
//!
//! Every handle carries a `target` label; the engine's own series use
//! [`contracts::ENGINE_METRICS_NAME`].

use std::fmt;
use std::sync::Arc;

use contracts::{ContractError, Counter, Gauge, MetricsCollector};
use metrics::{counter, gauge, histogram};

pub const QUEUE_SIZE: &str = "logfan_queue_size";
pub const LOGGED_TOTAL: &str = "logfan_logged_total";
pub const ERRORS_TOTAL: &str = "logfan_errors_total";
pub const DROPPED_TOTAL: &str = "logfan_dropped_total";
pub const BLOCKED_TOTAL: &str = "logfan_blocked_total";

struct RecorderGauge(metrics::Gauge);

impl Gauge for RecorderGauge {
    fn set(&self, value: f64) {
        self.0.set(value);
    }
}

struct RecorderCounter(metrics::Counter);

impl Counter for RecorderCounter {
    fn add(&self, n: u64) {
        self.0.increment(n);
    }
}

/// Collector backed by the globally installed `metrics` recorder
///
/// Handles registered before a recorder is installed stay no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderCollector;

impl RecorderCollector {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsCollector for RecorderCollector {
    fn queue_size_gauge(&self, target: &str) -> Result<Arc<dyn Gauge>, ContractError> {
        let handle = gauge!(QUEUE_SIZE, "target" => target.to_string());
        Ok(Arc::new(RecorderGauge(handle)))
    }

    fn logged_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        Ok(Arc::new(RecorderCounter(
            counter!(LOGGED_TOTAL, "target" => target.to_string()),
        )))
    }

    fn error_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        Ok(Arc::new(RecorderCounter(
            counter!(ERRORS_TOTAL, "target" => target.to_string()),
        )))
    }

    fn dropped_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        Ok(Arc::new(RecorderCounter(
            counter!(DROPPED_TOTAL, "target" => target.to_string()),
        )))
    }

    fn blocked_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        Ok(Arc::new(RecorderCounter(
            counter!(BLOCKED_TOTAL, "target" => target.to_string()),
        )))
    }
}

/// Records emitted by a producer
pub fn record_records_emitted(producer: &str, n: u64) {
    counter!("logfan_records_emitted_total", "producer" => producer.to_string()).increment(n);
}

/// Wall-clock time of one `Engine::flush`
pub fn record_flush_latency_ms(latency_ms: f64) {
    histogram!("logfan_flush_latency_ms").record(latency_ms);
}

/// End-of-run engine summary
#[derive(Debug, Clone, Default)]
pub struct EngineSummary {
    pub emitted: u64,
    pub logged: u64,
    pub errors: u64,
    pub dropped: u64,
    pub blocked: u64,
    /// Percentage of emitted records dropped by the queue-full policy
    pub drop_rate: f64,
    pub enqueue_latency_us: StatsSummary,
    pub flush_latency_ms: StatsSummary,
}

impl EngineSummary {
    pub fn new(emitted: u64, logged: u64, errors: u64, dropped: u64, blocked: u64) -> Self {
        Self {
            emitted,
            logged,
            errors,
            dropped,
            blocked,
            drop_rate: if emitted > 0 {
                dropped as f64 / emitted as f64 * 100.0
            } else {
                0.0
            },
            ..Default::default()
        }
    }

    pub fn with_latencies(mut self, enqueue_us: &RunningStats, flush_ms: &RunningStats) -> Self {
        self.enqueue_latency_us = StatsSummary::from(enqueue_us);
        self.flush_latency_ms = StatsSummary::from(flush_ms);
        self
    }
}

impl fmt::Display for EngineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Engine Summary ===")?;
        writeln!(f, "Emitted records: {}", self.emitted)?;
        writeln!(f, "Logged records: {}", self.logged)?;
        writeln!(f, "Dropped records: {} ({:.2}%)", self.dropped, self.drop_rate)?;
        writeln!(f, "Blocked enqueues: {}", self.blocked)?;
        writeln!(f, "Internal errors: {}", self.errors)?;
        writeln!(f, "Enqueue latency (us): {}", self.enqueue_latency_us)?;
        writeln!(f, "Flush latency (ms): {}", self.flush_latency_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// Online mean and variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Fold another accumulator into this one (Chan et al.)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let total = self.count + other.count;
        let delta = other.mean - self.mean;
        self.m2 += other.m2 + delta * delta * (self.count * other.count) as f64 / total as f64;
        self.mean += delta * other.count as f64 / total as f64;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = total;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let mut left = RunningStats::default();
        let mut right = RunningStats::default();
        let mut all = RunningStats::default();
        for v in [1.0, 2.0, 3.0] {
            left.push(v);
            all.push(v);
        }
        for v in [10.0, 20.0] {
            right.push(v);
            all.push(v);
        }

        left.merge(&right);
        assert_eq!(left.count(), all.count());
        assert!((left.mean() - all.mean()).abs() < 1e-10);
        assert!((left.variance() - all.variance()).abs() < 1e-9);
        assert!((left.max() - 20.0).abs() < 1e-10);

        let mut empty = RunningStats::default();
        empty.merge(&all);
        assert_eq!(empty.count(), 5);
    }

    #[test]
    fn test_recorder_handles_are_noops_without_recorder() {
        let collector = RecorderCollector::new();
        collector.logged_counter("console").unwrap().inc();
        collector.queue_size_gauge("console").unwrap().set(3.0);
    }

    #[test]
    fn test_summary_display() {
        let summary = EngineSummary::new(200, 190, 1, 10, 4);
        assert!((summary.drop_rate - 5.0).abs() < 1e-10);

        let output = summary.to_string();
        assert!(output.contains("Logged records: 190"));
        assert!(output.contains("5.00%"));
        assert!(output.contains("Flush latency (ms): N/A"));
    }
}
