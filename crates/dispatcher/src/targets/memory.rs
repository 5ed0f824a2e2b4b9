//! MemoryTarget - keeps every delivered record in memory

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use contracts::{ContractError, Level, LevelStatus, LogRec, Record, StdFilter, Target};

/// Target that retains records for inspection
///
/// Useful for tests and for hosts that want to assert on emitted logs.
pub struct MemoryTarget {
    name: String,
    filter: RwLock<StdFilter>,
    records: Mutex<Vec<Arc<Record>>>,
    flushes: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl MemoryTarget {
    pub fn new(name: impl Into<String>, filter: StdFilter) -> Self {
        Self {
            name: name.into(),
            filter: RwLock::new(filter),
            records: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }

    /// Replace the filter; follow with `Engine::reset_level_cache`
    pub fn set_filter(&self, filter: StdFilter) {
        *self.filter.write().unwrap_or_else(PoisonError::into_inner) = filter;
    }

    /// Records delivered so far, in delivery order
    pub fn records(&self) -> Vec<Arc<Record>> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages delivered so far, in delivery order
    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.msg().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush markers received
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Target for MemoryTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_level_enabled(&self, level: Level) -> LevelStatus {
        self.filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status(level)
    }

    fn log(&self, rec: LogRec) {
        match rec {
            LogRec::Flush(signal) => {
                self.flushes.fetch_add(1, Ordering::SeqCst);
                signal.complete();
            }
            LogRec::Data(rec) => self
                .records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(rec),
        }
    }

    fn shutdown(&self, _deadline: Instant) -> Result<(), ContractError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
