//! Engine metrics handles, the queue-depth updater and an in-memory collector

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{ContractError, Counter, Gauge, LogRec, MetricsCollector, ENGINE_METRICS_NAME};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::Serialize;
use tracing::debug;

use crate::error::EngineError;

/// Handles the engine updates on its own behalf
pub(crate) struct EngineMetrics {
    pub(crate) collector: Arc<dyn MetricsCollector>,
    pub(crate) queue_size: Arc<dyn Gauge>,
    pub(crate) logged: Arc<dyn Counter>,
    pub(crate) errors: Arc<dyn Counter>,
    pub(crate) dropped: Arc<dyn Counter>,
    pub(crate) blocked: Arc<dyn Counter>,
}

impl EngineMetrics {
    pub(crate) fn new(collector: Arc<dyn MetricsCollector>) -> Result<Self, ContractError> {
        Ok(Self {
            queue_size: collector.queue_size_gauge(ENGINE_METRICS_NAME)?,
            logged: collector.logged_counter(ENGINE_METRICS_NAME)?,
            errors: collector.error_counter(ENGINE_METRICS_NAME)?,
            dropped: collector.dropped_counter(ENGINE_METRICS_NAME)?,
            blocked: collector.blocked_counter(ENGINE_METRICS_NAME)?,
            collector,
        })
    }
}

/// Spawn the queue-depth poller
///
/// Samples `queue.len()` into `gauge` every `freq` until `stop` is closed.
pub(crate) fn spawn_updater(
    queue: Receiver<LogRec>,
    gauge: Arc<dyn Gauge>,
    stop: Receiver<()>,
    freq: Duration,
) -> Result<JoinHandle<()>, EngineError> {
    thread::Builder::new()
        .name("logfan-metrics".into())
        .spawn(move || {
            debug!(freq_ms = freq.as_millis() as u64, "Metrics updater started");
            loop {
                match stop.recv_timeout(freq) {
                    Err(RecvTimeoutError::Timeout) => gauge.set(queue.len() as f64),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("Metrics updater stopped");
        })
        .map_err(|source| EngineError::Spawn {
            name: "metrics",
            source,
        })
}

/// Atomic gauge, stored as f64 bits
#[derive(Debug, Default)]
pub struct AtomicGauge(AtomicU64);

impl AtomicGauge {
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl Gauge for AtomicGauge {
    fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Atomic monotonic counter
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Counter for AtomicCounter {
    fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
}

/// Metrics for a single target name
#[derive(Debug, Default)]
pub struct TargetMetrics {
    queue_size: Arc<AtomicGauge>,
    logged: Arc<AtomicCounter>,
    errors: Arc<AtomicCounter>,
    dropped: Arc<AtomicCounter>,
    blocked: Arc<AtomicCounter>,
}

impl TargetMetrics {
    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_size: self.queue_size.get(),
            logged: self.logged.get(),
            errors: self.errors.get(),
            dropped: self.dropped.get(),
            blocked: self.blocked.get(),
        }
    }
}

/// Snapshot of target metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub queue_size: f64,
    pub logged: u64,
    pub errors: u64,
    pub dropped: u64,
    pub blocked: u64,
}

/// In-memory collector backed by atomics
#[derive(Debug, Default)]
pub struct AtomicCollector {
    targets: Mutex<HashMap<String, Arc<TargetMetrics>>>,
}

impl AtomicCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, target: &str) -> Arc<TargetMetrics> {
        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(targets.entry(target.to_string()).or_default())
    }

    /// Snapshot for one target name, if any handle was requested for it
    pub fn snapshot(&self, target: &str) -> Option<MetricsSnapshot> {
        let targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        targets.get(target).map(|m| m.snapshot())
    }

    /// Snapshot of the engine's own metrics
    pub fn engine_snapshot(&self) -> MetricsSnapshot {
        self.snapshot(ENGINE_METRICS_NAME).unwrap_or_default()
    }

    /// Snapshots for every known target name, sorted by name
    pub fn snapshots(&self) -> Vec<(String, MetricsSnapshot)> {
        let targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = targets
            .iter()
            .map(|(name, m)| (name.clone(), m.snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

impl MetricsCollector for AtomicCollector {
    fn queue_size_gauge(&self, target: &str) -> Result<Arc<dyn Gauge>, ContractError> {
        Ok(self.entry(target).queue_size.clone())
    }

    fn logged_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        Ok(self.entry(target).logged.clone())
    }

    fn error_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        Ok(self.entry(target).errors.clone())
    }

    fn dropped_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        Ok(self.entry(target).dropped.clone())
    }

    fn blocked_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        Ok(self.entry(target).blocked.clone())
    }
}
