//! Engine - bounded intake queue, target registry and level checks
//!
//! The registry and the lifecycle state sit behind separate reader-writer
//! locks. Lock order is always lifecycle, then targets.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::Instant;

use contracts::{EngineConfig, Level, LevelStatus, LogRec, MetricsCollector, Record, Target};
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};
use tracing::{debug, error, info, instrument};

use crate::buffer_pool::{BufferPool, PooledBuffer};
use crate::error::{panic_message, EngineError};
use crate::hooks::Hooks;
use crate::level_cache::{new_level_cache, LevelCache};
use crate::logger::Logger;
use crate::metrics::{spawn_updater, EngineMetrics};
use crate::worker::spawn_consumer;

/// Builder for creating an Engine
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    hooks: Hooks,
    collector: Option<Arc<dyn MetricsCollector>>,
}

impl EngineBuilder {
    /// Create a new EngineBuilder
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Drop (`true`) or block (`false`) when the intake queue is full
    pub fn on_queue_full(
        mut self,
        f: impl Fn(&Record, usize) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_queue_full = Some(Arc::new(f));
        self
    }

    /// Same decision for targets that report their own saturation
    pub fn on_target_queue_full(
        mut self,
        f: impl Fn(&str, &Record, usize) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_target_queue_full = Some(Arc::new(f));
        self
    }

    /// Replace the default error sink
    pub fn on_error(mut self, f: impl Fn(&EngineError) + Send + Sync + 'static) -> Self {
        self.hooks.on_error = Some(Arc::new(f));
        self
    }

    /// Replace shutdown + process exit for fatal-style calls
    pub fn on_exit(mut self, f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.hooks.on_exit = Some(Arc::new(f));
        self
    }

    /// Replace shutdown + panic for panic-style calls
    pub fn on_panic(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.on_panic = Some(Arc::new(f));
        self
    }

    /// Report engine metrics to `collector`
    pub fn metrics(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Build the engine
    ///
    /// Nothing is started until the first target is registered.
    #[instrument(name = "engine_builder_build", skip(self))]
    pub fn build(self) -> Result<Engine, EngineError> {
        let metrics = self.collector.map(EngineMetrics::new).transpose()?;
        Ok(Engine::assemble(self.config, self.hooks, metrics))
    }
}

/// Log distribution engine
///
/// Cheap to clone; every clone drives the same queue and registry.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) config: EngineConfig,
    pub(crate) hooks: Hooks,
    targets: RwLock<Vec<Arc<dyn Target>>>,
    lifecycle: RwLock<Lifecycle>,
    runtime: OnceLock<Runtime>,
    buffers: Arc<BufferPool>,
    pub(crate) metrics: Option<EngineMetrics>,
}

#[derive(Default)]
pub(crate) struct Lifecycle {
    pub(crate) shutdown: bool,
    /// Dropping this sender stops the metrics updater
    pub(crate) metrics_stop: Option<Sender<()>>,
    pub(crate) metrics_updater: Option<JoinHandle<()>>,
}

/// State created exactly once, on first target registration
pub(crate) struct Runtime {
    tx: RwLock<Option<Sender<LogRec>>>,
    queue: Receiver<LogRec>,
    pub(crate) done: Receiver<()>,
    pub(crate) cache: Box<dyn LevelCache>,
    capacity: usize,
}

impl Runtime {
    fn start(inner: &Arc<Inner>, lifecycle: &mut Lifecycle) -> Result<Self, EngineError> {
        let capacity = inner.config.queue_capacity();
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let (done_tx, done_rx) = crossbeam_channel::bounded(0);

        spawn_consumer(Arc::clone(inner), rx.clone(), done_tx)?;

        if let Some(metrics) = &inner.metrics {
            let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
            let handle = spawn_updater(
                rx.clone(),
                Arc::clone(&metrics.queue_size),
                stop_rx,
                inner.config.metrics_update_freq(),
            )?;
            lifecycle.metrics_stop = Some(stop_tx);
            lifecycle.metrics_updater = Some(handle);
        }

        info!(
            capacity,
            level_cache = ?inner.config.level_cache,
            "Engine started"
        );

        Ok(Self {
            tx: RwLock::new(Some(tx)),
            queue: rx,
            done: done_rx,
            cache: new_level_cache(inner.config.level_cache),
            capacity,
        })
    }

    fn sender(&self) -> Option<Sender<LogRec>> {
        self.tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Close the intake queue; the consumer exits once it is drained
    pub(crate) fn close(&self) {
        self.tx
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Inner {
    pub(crate) fn read_targets(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn Target>>> {
        self.targets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_targets(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn Target>>> {
        self.targets.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn read_lifecycle(&self) -> RwLockReadGuard<'_, Lifecycle> {
        self.lifecycle.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_lifecycle(&self) -> RwLockWriteGuard<'_, Lifecycle> {
        self.lifecycle.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn runtime(&self) -> Option<&Runtime> {
        self.runtime.get()
    }

    /// Clear the level cache; the lifecycle write lock must be held
    pub(crate) fn clear_level_cache(&self) {
        if let Some(rt) = self.runtime.get() {
            rt.cache.clear();
        }
    }

    /// Route an internal failure to the error sink
    pub(crate) fn report_error(&self, err: EngineError) {
        if let Some(metrics) = &self.metrics {
            metrics.errors.inc();
        }
        match &self.hooks.on_error {
            Some(hook) => hook(&err),
            None => error!(target: "logfan::engine", error = %err, "Internal logging error"),
        }
    }

    /// Disjunction of every target's answer for `level`
    fn scan_targets(&self, level: Level) -> LevelStatus {
        let mut status = LevelStatus::DISABLED;
        for target in self.read_targets().iter() {
            let answer = panic::catch_unwind(AssertUnwindSafe(|| target.is_level_enabled(level)));
            match answer {
                Ok(s) if s.enabled => {
                    status.enabled = true;
                    if s.stacktrace {
                        status.stacktrace = true;
                        break;
                    }
                }
                Ok(_) => {}
                Err(payload) => self.report_error(EngineError::target_panic(
                    target.name(),
                    format!("level check failed: {}", panic_message(payload.as_ref())),
                )),
            }
        }
        status
    }

    pub(crate) fn try_enqueue(&self, rec: LogRec) -> Result<(), EngineError> {
        let rt = self.runtime.get().ok_or(EngineError::NotInitialized)?;
        let tx = rt.sender().ok_or(EngineError::ShutDown)?;

        let rec = match tx.try_send(rec) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Disconnected(_)) => return Err(EngineError::ShutDown),
            Err(TrySendError::Full(rec)) => rec,
        };

        // Control records are never offered to the drop policy
        if let LogRec::Data(data) = &rec {
            if self.hooks.queue_full(data, rt.capacity) {
                if let Some(metrics) = &self.metrics {
                    metrics.dropped.inc();
                }
                return Ok(());
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.blocked.inc();
        }

        let timeout = self.config.enqueue_timeout();
        match tx.send_timeout(rec, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(rec)) => Err(EngineError::EnqueueTimeout {
                level: rec
                    .level()
                    .map_or_else(|| "flush".to_string(), |l| l.name().to_string()),
                msg: rec.record().map(|r| r.msg().to_string()).unwrap_or_default(),
                timeout,
            }),
            Err(SendTimeoutError::Disconnected(_)) => Err(EngineError::ShutDown),
        }
    }

    /// Enqueue a control record, waiting for space no later than `deadline`
    ///
    /// Returns `Ok(false)` when the deadline passed with the queue still full.
    pub(crate) fn enqueue_until(
        &self,
        rec: LogRec,
        deadline: Instant,
    ) -> Result<bool, EngineError> {
        let rt = self.runtime.get().ok_or(EngineError::NotInitialized)?;
        let tx = rt.sender().ok_or(EngineError::ShutDown)?;

        let rec = match tx.try_send(rec) {
            Ok(()) => return Ok(true),
            Err(TrySendError::Disconnected(_)) => return Err(EngineError::ShutDown),
            Err(TrySendError::Full(rec)) => rec,
        };
        if let Some(metrics) = &self.metrics {
            metrics.blocked.inc();
        }

        match tx.send_deadline(rec, deadline) {
            Ok(()) => Ok(true),
            Err(SendTimeoutError::Timeout(_)) => Ok(false),
            Err(SendTimeoutError::Disconnected(_)) => Err(EngineError::ShutDown),
        }
    }
}

impl Engine {
    /// Engine with default options and hooks
    pub fn new() -> Self {
        Self::from_parts(EngineConfig::default(), Hooks::default())
    }

    /// Engine with the given options and hooks, without metrics
    pub fn from_parts(config: EngineConfig, hooks: Hooks) -> Self {
        Self::assemble(config, hooks, None)
    }

    fn assemble(config: EngineConfig, hooks: Hooks, metrics: Option<EngineMetrics>) -> Self {
        let buffers = Arc::new(BufferPool::new(
            config.max_pooled_buffer(),
            config.disable_buffer_pool,
        ));
        Self {
            inner: Arc::new(Inner {
                config,
                hooks,
                targets: RwLock::new(Vec::new()),
                lifecycle: RwLock::new(Lifecycle::default()),
                runtime: OnceLock::new(),
                buffers,
                metrics,
            }),
        }
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Add a target; fan-out order is registration order
    ///
    /// The first registration creates the intake queue, the level cache and
    /// the consumer thread. A metrics-enable failure is returned after the
    /// target has been added.
    ///
    /// # Errors
    /// - `ShutDown` once the engine has been shut down
    /// - `Spawn` when a worker thread cannot be started
    #[instrument(name = "engine_register_target", skip(self, target), fields(target = %target.name()))]
    pub fn register_target(&self, target: Arc<dyn Target>) -> Result<(), EngineError> {
        let mut lifecycle = self.inner.write_lifecycle();
        if lifecycle.shutdown {
            return Err(EngineError::ShutDown);
        }

        if self.inner.runtime.get().is_none() {
            let rt = Runtime::start(&self.inner, &mut lifecycle)?;
            // Serialised by the lifecycle write lock, so the cell is empty here
            let _ = self.inner.runtime.set(rt);
        }

        let mut result = Ok(());
        if let (Some(metrics), Some(mt)) = (&self.inner.metrics, target.as_metrics_target()) {
            result = mt
                .enable_metrics(
                    Arc::clone(&metrics.collector),
                    self.inner.config.metrics_update_freq(),
                )
                .map_err(EngineError::from);
        }

        let count = {
            let mut targets = self.inner.write_targets();
            targets.push(target);
            targets.len()
        };
        self.inner.clear_level_cache();

        debug!(targets = count, "Target registered");
        result
    }

    /// Whether any registered target accepts `level`
    ///
    /// Served from the level cache; a miss scans every target. Always
    /// disabled before the first registration and after shutdown.
    pub fn is_level_enabled(&self, level: Level) -> LevelStatus {
        let Some(rt) = self.inner.runtime() else {
            return LevelStatus::DISABLED;
        };
        if let Some(status) = rt.cache.get(level.id()) {
            return status;
        }

        let lifecycle = self.inner.read_lifecycle();
        if lifecycle.shutdown {
            return LevelStatus::DISABLED;
        }

        let status = self.inner.scan_targets(level);
        if let Err(err) = rt.cache.put(level.id(), status) {
            self.inner.report_error(err);
            return LevelStatus::DISABLED;
        }
        status
    }

    /// Invalidate every cached level decision
    ///
    /// Call after changing the level configuration of a registered target.
    pub fn reset_level_cache(&self) {
        let _lifecycle = self.inner.write_lifecycle();
        self.inner.clear_level_cache();
    }

    /// Queue a record for fan-out
    ///
    /// Never fails to the caller: a timeout, a missing queue or a shut down
    /// engine is reported through the error hook and the record is lost.
    pub fn enqueue(&self, rec: LogRec) {
        if let Err(err) = self.inner.try_enqueue(rec) {
            self.inner.report_error(err);
        }
    }

    /// Consult the target-queue-full policy (`true` = drop)
    pub fn on_target_queue_full(&self, target: &str, rec: &Record, capacity: usize) -> bool {
        self.inner.hooks.target_queue_full(target, rec, capacity)
    }

    /// Route a failure to the configured error sink
    pub fn report_error(&self, err: EngineError) {
        self.inner.report_error(err);
    }

    pub fn new_logger(&self) -> Logger {
        Logger::new(self.clone())
    }

    pub fn has_targets(&self) -> bool {
        !self.inner.read_targets().is_empty()
    }

    pub fn target_count(&self) -> usize {
        self.inner.read_targets().len()
    }

    /// Records currently waiting in the intake queue
    pub fn queue_len(&self) -> usize {
        self.inner.runtime().map_or(0, |rt| rt.queue.len())
    }

    /// Resolved queue capacity, once the queue exists
    pub fn queue_capacity(&self) -> Option<usize> {
        self.inner.runtime().map(|rt| rt.capacity)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.read_lifecycle().shutdown
    }

    pub fn buffer_pool(&self) -> Arc<BufferPool> {
        Arc::clone(&self.inner.buffers)
    }

    /// Borrow a formatting buffer, returned to the pool on drop
    pub fn borrow_buffer(&self) -> PooledBuffer<'_> {
        self.inner.buffers.borrow_guard()
    }

    /// Fatal-style exit: hook, or shutdown then `process::exit`
    pub(crate) fn exit(&self, code: i32) {
        if let Some(hook) = &self.inner.hooks.on_exit {
            hook(code);
            return;
        }
        if let Err(err) = self.shutdown() {
            self.inner.report_error(err);
        }
        std::process::exit(code);
    }

    /// Panic-style abort: hook, or shutdown then panic
    pub(crate) fn panic(&self, msg: &str) {
        if let Some(hook) = &self.inner.hooks.on_panic {
            hook(msg);
            return;
        }
        if let Err(err) = self.shutdown() {
            self.inner.report_error(err);
        }
        panic!("{msg}");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("targets", &self.target_count())
            .field("queue_capacity", &self.queue_capacity())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
