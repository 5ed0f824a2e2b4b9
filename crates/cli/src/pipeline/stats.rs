//! Statistics from a load run.

use std::collections::BTreeMap;
use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::{EngineSummary, RunningStats};
use serde::Serialize;

use super::generator::{CountingTarget, ProducerReport};

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub duration_secs: f64,
    pub producers: usize,
    /// Log calls made by producers
    pub emitted: u64,
    /// Records that reached the counting target
    pub delivered: u64,
    /// Flush markers the counting target acknowledged
    pub flushes: u64,
    pub flush_errors: u64,
    /// Errors that went through the engine's error hook
    pub reported_errors: u64,
    /// Engine counters as seen by the in-memory collector
    pub engine: MetricsSnapshot,
    pub levels: BTreeMap<String, u64>,
    #[serde(skip)]
    pub enqueue_us: RunningStats,
    #[serde(skip)]
    pub flush_ms: RunningStats,
}

impl RunStats {
    pub(crate) fn collect(
        duration: Duration,
        producers: usize,
        reports: &[ProducerReport],
        counter: &CountingTarget,
        engine: MetricsSnapshot,
        reported_errors: u64,
    ) -> Self {
        let mut enqueue_us = RunningStats::default();
        let mut flush_ms = RunningStats::default();
        for report in reports {
            enqueue_us.merge(&report.enqueue_us);
            flush_ms.merge(&report.flush_ms);
        }

        Self {
            duration_secs: duration.as_secs_f64(),
            producers,
            emitted: reports.iter().map(|r| r.emitted).sum(),
            delivered: counter.total(),
            flushes: counter.flushes(),
            flush_errors: reports.iter().map(|r| r.flush_errors).sum(),
            reported_errors,
            engine,
            levels: counter.by_level(),
            enqueue_us,
            flush_ms,
        }
    }

    /// Records delivered per second
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.delivered as f64 / self.duration_secs
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> EngineSummary {
        EngineSummary::new(
            self.emitted,
            self.engine.logged,
            self.engine.errors,
            self.engine.dropped,
            self.engine.blocked,
        )
        .with_latencies(&self.enqueue_us, &self.flush_ms)
    }

    pub fn print_summary(&self) {
        let summary = self.summary();

        println!("\n=== Load Run ===");
        println!("  ├─ Duration: {:.2}s", self.duration_secs);
        println!("  ├─ Producers: {}", self.producers);
        println!("  ├─ Emitted: {}", self.emitted);
        println!("  ├─ Delivered: {}", self.delivered);
        println!("  ├─ Throughput: {:.0} records/s", self.throughput());
        println!("  └─ Flushes: {} ({} failed)", self.flushes, self.flush_errors);

        println!("\n=== Engine ===");
        println!("  ├─ Logged: {}", summary.logged);
        println!("  ├─ Dropped: {} ({:.2}%)", summary.dropped, summary.drop_rate);
        println!("  ├─ Blocked enqueues: {}", summary.blocked);
        println!("  ├─ Internal errors: {}", summary.errors);
        println!("  ├─ Enqueue latency (us): {}", summary.enqueue_latency_us);
        println!("  └─ Flush latency (ms): {}", summary.flush_latency_ms);

        if !self.levels.is_empty() {
            println!("\n=== Levels ===");
            for (level, count) in &self.levels {
                println!("  ├─ {level}: {count}");
            }
        }

        println!();
    }
}
