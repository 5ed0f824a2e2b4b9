//! # Integration Tests
//!
//! Cross-crate end-to-end tests for the engine contract.
//!
//! - Contract smoke tests
//! - Ordering, shutdown, backpressure and isolation properties
//! - Config file to running engine

#[cfg(test)]
mod mocks {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use contracts::{
        ContractError, Counter, Level, LevelStatus, LogRec, MetricsCollector, MetricsTarget,
        StdFilter, Target,
    };
    use crossbeam_channel::{Receiver, Sender};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Data(String),
        Flush,
    }

    /// Records every call to `log` in order
    pub struct RecordingTarget {
        name: String,
        filter: StdFilter,
        pub calls: Mutex<Vec<Call>>,
        pub shutdowns: AtomicUsize,
        logged: Mutex<Option<Arc<dyn Counter>>>,
    }

    impl RecordingTarget {
        pub fn new(name: &str, filter: StdFilter) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                filter,
                calls: Mutex::new(Vec::new()),
                shutdowns: AtomicUsize::new(0),
                logged: Mutex::new(None),
            })
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn data(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Data(msg) => Some(msg),
                    Call::Flush => None,
                })
                .collect()
        }

        pub fn shutdowns(&self) -> usize {
            self.shutdowns.load(Ordering::SeqCst)
        }
    }

    impl Target for RecordingTarget {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_level_enabled(&self, level: Level) -> LevelStatus {
            self.filter.status(level)
        }

        fn log(&self, rec: LogRec) {
            match rec {
                LogRec::Flush(signal) => {
                    self.calls.lock().unwrap().push(Call::Flush);
                    signal.complete();
                }
                LogRec::Data(rec) => {
                    self.calls.lock().unwrap().push(Call::Data(rec.msg().to_string()));
                    if let Some(counter) = self.logged.lock().unwrap().as_ref() {
                        counter.inc();
                    }
                }
            }
        }

        fn shutdown(&self, _deadline: Instant) -> Result<(), ContractError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn as_metrics_target(&self) -> Option<&dyn MetricsTarget> {
            Some(self)
        }
    }

    impl MetricsTarget for RecordingTarget {
        fn enable_metrics(
            &self,
            collector: Arc<dyn MetricsCollector>,
            _update_freq: Duration,
        ) -> Result<(), ContractError> {
            *self.logged.lock().unwrap() = Some(collector.logged_counter(&self.name)?);
            Ok(())
        }
    }

    /// Panics on every data record
    pub struct PanickingTarget;

    impl Target for PanickingTarget {
        fn name(&self) -> &str {
            "panicking"
        }

        fn is_level_enabled(&self, _level: Level) -> LevelStatus {
            LevelStatus::new(true, false)
        }

        fn log(&self, rec: LogRec) {
            match rec {
                LogRec::Flush(signal) => signal.complete(),
                LogRec::Data(_) => panic!("target exploded"),
            }
        }

        fn shutdown(&self, _deadline: Instant) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// Never returns from `log` until released, so the queue is never drained
    pub struct StuckTarget {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl StuckTarget {
        pub fn new() -> (Arc<Self>, Receiver<()>, Sender<()>) {
            let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
            let (release_tx, release_rx) = crossbeam_channel::unbounded();
            let target = Arc::new(Self {
                entered: entered_tx,
                release: release_rx,
            });
            (target, entered_rx, release_tx)
        }
    }

    impl Target for StuckTarget {
        fn name(&self) -> &str {
            "stuck"
        }

        fn is_level_enabled(&self, _level: Level) -> LevelStatus {
            LevelStatus::new(true, false)
        }

        fn log(&self, rec: LogRec) {
            match rec {
                LogRec::Flush(signal) => signal.complete(),
                LogRec::Data(_) => {
                    let _ = self.entered.send(());
                    let _ = self.release.recv();
                }
            }
        }

        fn shutdown(&self, _deadline: Instant) -> Result<(), ContractError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{EngineConfig, LevelStatus, StdFilter, DEBUG, ERROR, FATAL, INFO, PANIC};

    #[test]
    fn test_standard_levels_are_ordered() {
        let ids: Vec<u32> = [PANIC, FATAL, ERROR, INFO, DEBUG].iter().map(|l| l.id()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(PANIC.stacktrace() && FATAL.stacktrace() && !ERROR.stacktrace());
    }

    #[test]
    fn test_default_filter() {
        let filter = StdFilter::default();
        assert_eq!(filter.status(DEBUG), LevelStatus::DISABLED);
        assert_eq!(filter.status(INFO), LevelStatus::new(true, false));
        assert_eq!(filter.status(PANIC), LevelStatus::new(true, true));
    }

    #[test]
    fn test_default_config_resolves() {
        let config = EngineConfig::default();
        assert_eq!(config.queue_capacity(), 1000);
        assert_eq!(config.flush_timeout().as_secs(), 10);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{EngineConfig, Field, LevelStatus, LogRec, Record, StdFilter, INFO, PANIC, TRACE, WARN};
    use dispatcher::{AtomicCollector, Engine, EngineError, LevelCache, MapLevelCache};

    use crate::mocks::{Call, PanickingTarget, RecordingTarget, StuckTarget};

    fn fast_config() -> EngineConfig {
        EngineConfig {
            flush_timeout_ms: 1_000,
            shutdown_timeout_ms: 2_000,
            ..Default::default()
        }
    }

    /// Register T, enqueue 3 INFO records, flush with a 1s deadline
    #[test]
    fn test_flush_scenario() {
        let engine = Engine::from_parts(fast_config(), Default::default());
        let t = RecordingTarget::new("T", StdFilter::new(INFO, PANIC));
        engine.register_target(t.clone()).unwrap();

        assert_eq!(engine.is_level_enabled(INFO), LevelStatus::new(true, false));
        for msg in ["one", "two", "three"] {
            engine.enqueue(LogRec::data(Record::new(INFO, msg)));
        }
        engine.flush().unwrap();

        assert_eq!(
            t.calls(),
            vec![
                Call::Data("one".into()),
                Call::Data("two".into()),
                Call::Data("three".into()),
                Call::Flush,
            ]
        );
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_every_target_sees_every_record_once_in_order() {
        let engine = Engine::from_parts(
            EngineConfig {
                max_queue_size: 8,
                ..fast_config()
            },
            Default::default(),
        );
        let targets: Vec<_> = (0..3)
            .map(|i| RecordingTarget::new(&format!("t{i}"), StdFilter::new(TRACE, PANIC)))
            .collect();
        for t in &targets {
            engine.register_target(t.clone()).unwrap();
        }

        let logger = engine.new_logger();
        let expected: Vec<String> = (0..500).map(|i| format!("msg-{i}")).collect();
        for msg in &expected {
            logger.info(msg.clone());
        }
        engine.flush().unwrap();

        for t in &targets {
            assert_eq!(t.data(), expected);
            assert_eq!(t.calls().last(), Some(&Call::Flush));
        }
        engine.shutdown().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_producers_keep_per_producer_order() {
        let engine = Engine::from_parts(fast_config(), Default::default());
        let t = RecordingTarget::new("t", StdFilter::new(TRACE, PANIC));
        engine.register_target(t.clone()).unwrap();

        let mut handles = Vec::new();
        for p in 0..4 {
            let logger = engine.new_logger().with_fields([Field::new("producer", p)]);
            handles.push(tokio::task::spawn_blocking(move || {
                for i in 0..250 {
                    logger.info(format!("{p}:{i}"));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let closing = engine.clone();
        tokio::task::spawn_blocking(move || closing.flush())
            .await
            .unwrap()
            .unwrap();

        let data = t.data();
        assert_eq!(data.len(), 1_000);
        for p in 0..4 {
            let seq: Vec<u32> = data
                .iter()
                .filter_map(|m| m.strip_prefix(&format!("{p}:")))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(seq, (0..250).collect::<Vec<_>>());
        }
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_is_final() {
        let engine = Engine::from_parts(fast_config(), Default::default());
        let t = RecordingTarget::new("t", StdFilter::new(TRACE, PANIC));
        engine.register_target(t.clone()).unwrap();
        engine.new_logger().info("before");

        engine.shutdown().unwrap();
        assert_eq!(t.data(), vec!["before"]);
        assert_eq!(t.shutdowns(), 1);

        for level in [PANIC, WARN, INFO, TRACE] {
            assert_eq!(engine.is_level_enabled(level), LevelStatus::DISABLED);
        }
        engine.new_logger().warn("after");
        engine.enqueue(LogRec::data(Record::new(WARN, "forced")));
        assert_eq!(t.data(), vec!["before"]);

        assert!(matches!(engine.shutdown(), Err(EngineError::AlreadyShutDown)));
        assert_eq!(t.shutdowns(), 1);
    }

    #[test]
    fn test_drop_policy_never_blocks_or_delivers() {
        let engine = Engine::builder(EngineConfig {
            max_queue_size: 1,
            ..fast_config()
        })
        .on_queue_full(|_, _| true)
        .build()
        .unwrap();
        let (stuck, entered, release) = StuckTarget::new();
        let t = RecordingTarget::new("t", StdFilter::new(TRACE, PANIC));
        engine.register_target(stuck).unwrap();
        engine.register_target(t.clone()).unwrap();

        let logger = engine.new_logger();
        logger.info("in-flight");
        entered.recv_timeout(Duration::from_secs(1)).unwrap();
        logger.info("queued");

        let start = Instant::now();
        for i in 0..10 {
            logger.info(format!("dropped-{i}"));
        }
        assert!(start.elapsed() < Duration::from_millis(500));

        for _ in 0..2 {
            release.send(()).unwrap();
        }
        engine.flush().unwrap();
        assert_eq!(t.data(), vec!["in-flight", "queued"]);
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_blocking_enqueue_gives_up_after_timeout() {
        let errors = Arc::new(std::sync::Mutex::new(Vec::new()));
        let engine = {
            let errors = Arc::clone(&errors);
            Engine::builder(EngineConfig {
                max_queue_size: 1,
                enqueue_timeout_ms: 100,
                ..fast_config()
            })
            .on_error(move |err: &EngineError| errors.lock().unwrap().push(err.is_timeout()))
            .build()
            .unwrap()
        };
        let (stuck, entered, release) = StuckTarget::new();
        engine.register_target(stuck).unwrap();

        let logger = engine.new_logger();
        logger.info("in-flight");
        entered.recv_timeout(Duration::from_secs(1)).unwrap();
        logger.info("queued");

        let start = Instant::now();
        logger.info("blocked");
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(100) + Duration::from_millis(900));
        assert_eq!(*errors.lock().unwrap(), vec![true]);

        for _ in 0..2 {
            release.send(()).unwrap();
        }
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_panicking_target_is_isolated() {
        let engine = Engine::builder(fast_config())
            .on_error(|_| {})
            .build()
            .unwrap();
        let before = RecordingTarget::new("before", StdFilter::new(TRACE, PANIC));
        let after = RecordingTarget::new("after", StdFilter::new(TRACE, PANIC));
        engine.register_target(before.clone()).unwrap();
        engine.register_target(Arc::new(PanickingTarget)).unwrap();
        engine.register_target(after.clone()).unwrap();

        let logger = engine.new_logger();
        for i in 0..5 {
            logger.info(format!("r{i}"));
        }
        engine.flush().unwrap();

        let expected: Vec<String> = (0..5).map(|i| format!("r{i}")).collect();
        assert_eq!(before.data(), expected);
        assert_eq!(after.data(), expected);
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_level_cache_tracks_registry() {
        let engine = Engine::from_parts(fast_config(), Default::default());
        engine
            .register_target(RecordingTarget::new("warn", StdFilter::new(WARN, PANIC)))
            .unwrap();
        assert!(!engine.is_level_enabled(INFO).enabled);
        assert!(!engine.is_level_enabled(INFO).enabled);

        engine
            .register_target(RecordingTarget::new("info", StdFilter::new(INFO, PANIC)))
            .unwrap();
        assert!(engine.is_level_enabled(INFO).enabled);
        assert!(engine.is_level_enabled(INFO).enabled);
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_map_cache_standalone() {
        let cache = MapLevelCache::default();
        cache.put(INFO.id(), LevelStatus::new(true, false)).unwrap();
        assert_eq!(cache.get(INFO.id()), Some(LevelStatus::new(true, false)));
        cache.clear();
        assert_eq!(cache.get(INFO.id()), None);
    }

    #[test]
    fn test_engine_from_config_file() {
        let content = r#"
max_queue_size = 16
enqueue_timeout_ms = 500
flush_timeout_ms = 1000
shutdown_timeout_ms = 2000
level_cache = "map"
"#;
        let config = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let collector = Arc::new(AtomicCollector::new());
        let engine = Engine::builder(config)
            .metrics(collector.clone())
            .build()
            .unwrap();
        let t = RecordingTarget::new("file", StdFilter::new(TRACE, PANIC));
        engine.register_target(t.clone()).unwrap();
        assert_eq!(engine.queue_capacity(), Some(16));

        let logger = engine.new_logger();
        for i in 0..40 {
            logger.debug(format!("d{i}"));
        }
        engine.flush().unwrap();

        assert_eq!(t.data().len(), 40);
        assert_eq!(collector.engine_snapshot().logged, 40);
        // Per-target handle obtained through enable_metrics
        assert_eq!(collector.snapshot("file").map(|s| s.logged), Some(40));
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_recorder_collector_plugs_into_engine() {
        let engine = Engine::builder(fast_config())
            .metrics(Arc::new(observability::RecorderCollector::new()))
            .build()
            .unwrap();
        let t = RecordingTarget::new("t", StdFilter::new(TRACE, PANIC));
        engine.register_target(t.clone()).unwrap();

        engine.new_logger().info("counted by the global recorder");
        engine.flush().unwrap();
        assert_eq!(t.data().len(), 1);
        engine.shutdown().unwrap();
    }
}
