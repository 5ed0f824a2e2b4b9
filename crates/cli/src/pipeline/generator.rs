//! Producer threads driving one engine instance.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use contracts::{
    ContractError, EngineConfig, Field, Level, LevelStatus, LogRec, StdFilter, Target, DEBUG,
    ERROR, INFO, TRACE, WARN,
};
use dispatcher::{AtomicCollector, Engine, EngineError, Logger, TracingTarget};
use observability::{record_flush_latency_ms, record_records_emitted, RecorderCollector, RunningStats};
use tracing::{debug, info, instrument, warn};

use super::collector::TeeCollector;
use super::stats::RunStats;
use crate::error::Result;

/// Load shape for one run
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub producers: usize,
    pub records_per_producer: u64,
    /// Flush after this many records per producer, 0 = only at the end
    pub flush_every: u64,
    pub drop_on_full: bool,
    pub console_filter: StdFilter,
    /// Most severe levels up to this one carry a stack trace
    pub stacktrace: Level,
    /// Also report through the global `metrics` recorder
    pub export_metrics: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            records_per_producer: 10_000,
            flush_every: 0,
            drop_on_full: false,
            console_filter: StdFilter::new(WARN, contracts::PANIC),
            stacktrace: contracts::PANIC,
            export_metrics: false,
        }
    }
}

/// Target that only counts what it receives, per level
pub struct CountingTarget {
    name: String,
    filter: StdFilter,
    total: AtomicU64,
    flushes: AtomicU64,
    by_level: Mutex<BTreeMap<&'static str, u64>>,
}

impl CountingTarget {
    pub fn new(name: impl Into<String>, filter: StdFilter) -> Self {
        Self {
            name: name.into(),
            filter,
            total: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            by_level: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn by_level(&self) -> BTreeMap<String, u64> {
        self.by_level
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, n)| (name.to_string(), *n))
            .collect()
    }
}

impl Target for CountingTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_level_enabled(&self, level: Level) -> LevelStatus {
        self.filter.status(level)
    }

    fn log(&self, rec: LogRec) {
        match rec {
            LogRec::Flush(signal) => {
                self.flushes.fetch_add(1, Ordering::Relaxed);
                signal.complete();
            }
            LogRec::Data(rec) => {
                self.total.fetch_add(1, Ordering::Relaxed);
                *self
                    .by_level
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(rec.level().name())
                    .or_default() += 1;
            }
        }
    }

    fn shutdown(&self, _deadline: Instant) -> std::result::Result<(), ContractError> {
        debug!(target_name = %self.name, total = self.total(), "Counting target closed");
        Ok(())
    }
}

/// What one producer did
#[derive(Debug, Default)]
pub(crate) struct ProducerReport {
    pub(crate) emitted: u64,
    pub(crate) flush_errors: u64,
    pub(crate) enqueue_us: RunningStats,
    pub(crate) flush_ms: RunningStats,
}

/// Fixed level mix: 1% error, 9% warn, 40% info, 50% debug
fn level_for(seq: u64) -> Level {
    if seq % 100 == 0 {
        ERROR
    } else if seq % 10 == 0 {
        WARN
    } else if seq % 2 == 0 {
        INFO
    } else {
        DEBUG
    }
}

fn produce(logger: &Logger, id: usize, load: &LoadConfig, stop: &AtomicBool) -> ProducerReport {
    let mut report = ProducerReport::default();

    for seq in 0..load.records_per_producer {
        if stop.load(Ordering::Relaxed) {
            debug!(producer = id, seq, "Producer interrupted");
            break;
        }

        let start = Instant::now();
        logger.log_with(level_for(seq), "synthetic record", vec![Field::new("seq", seq)]);
        report.enqueue_us.push(start.elapsed().as_secs_f64() * 1_000_000.0);
        report.emitted += 1;

        if load.flush_every > 0 && (seq + 1) % load.flush_every == 0 {
            let start = Instant::now();
            match logger.engine().flush() {
                Ok(()) => {
                    let ms = start.elapsed().as_secs_f64() * 1_000.0;
                    report.flush_ms.push(ms);
                    record_flush_latency_ms(ms);
                }
                Err(err) => {
                    warn!(producer = id, error = %err, "Flush failed");
                    report.flush_errors += 1;
                }
            }
        }
    }

    record_records_emitted(&format!("producer-{id}"), report.emitted);
    report
}

/// Builds the engine, runs every producer to completion, then closes it
pub struct LoadGenerator {
    engine_config: EngineConfig,
    load: LoadConfig,
}

impl LoadGenerator {
    pub fn new(engine_config: EngineConfig, load: LoadConfig) -> Self {
        Self {
            engine_config,
            load,
        }
    }

    /// Run until every producer finishes or `stop` is raised
    #[instrument(name = "load_generator_run", skip_all, fields(producers = self.load.producers))]
    pub async fn run(self, stop: Arc<AtomicBool>) -> Result<RunStats> {
        let collector = Arc::new(AtomicCollector::new());
        let mut tee = TeeCollector::new().with(collector.clone());
        if self.load.export_metrics {
            tee = tee.with(Arc::new(RecorderCollector::new()));
        }

        let reported = Arc::new(AtomicU64::new(0));
        let mut builder = Engine::builder(self.engine_config)
            .metrics(Arc::new(tee))
            .on_error({
                let reported = Arc::clone(&reported);
                move |err: &EngineError| {
                    reported.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, "Engine reported an error");
                }
            });
        if self.load.drop_on_full {
            builder = builder.on_queue_full(|_, _| true);
        }
        let engine = builder.build()?;

        let console = TracingTarget::new("console", self.load.console_filter)
            .with_buffer_pool(engine.buffer_pool());
        let counter = Arc::new(CountingTarget::new(
            "counter",
            StdFilter::new(TRACE, self.load.stacktrace),
        ));
        engine.register_target(Arc::new(console))?;
        engine.register_target(counter.clone())?;

        info!(
            queue_capacity = ?engine.queue_capacity(),
            records = self.load.records_per_producer,
            "Engine ready, starting producers"
        );

        let started = Instant::now();
        let load = Arc::new(self.load);
        let mut handles = Vec::with_capacity(load.producers);
        for id in 0..load.producers {
            let logger = engine
                .new_logger()
                .with_fields([Field::new("producer", id as u64)]);
            let load = Arc::clone(&load);
            let stop = Arc::clone(&stop);
            handles.push(tokio::task::spawn_blocking(move || {
                produce(&logger, id, &load, &stop)
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            reports.push(handle.await?);
        }

        // Both block on the consumer
        let closing = engine.clone();
        let (flushed, shut_down) = tokio::task::spawn_blocking(move || {
            let flushed = closing.flush();
            (flushed, closing.shutdown())
        })
        .await?;
        if let Err(err) = flushed {
            warn!(error = %err, "Final flush failed");
        }
        shut_down?;

        let stats = RunStats::collect(
            started.elapsed(),
            load.producers,
            &reports,
            &counter,
            collector.engine_snapshot(),
            reported.load(Ordering::Relaxed),
        );
        info!(
            emitted = stats.emitted,
            delivered = stats.delivered,
            dropped = stats.engine.dropped,
            "Load run finished"
        );
        Ok(stats)
    }
}
