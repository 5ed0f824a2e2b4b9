//! Mock targets shared by the unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use contracts::{ContractError, FlushSignal, Level, LevelStatus, LogRec, StdFilter, Target};
use crossbeam_channel::{Receiver, Sender};

use crate::error::EngineError;

/// Collects every reported error as text
#[derive(Clone, Default)]
pub(crate) struct ErrorLog(Arc<Mutex<Vec<String>>>);

impl ErrorLog {
    pub(crate) fn hook(&self) -> impl Fn(&EngineError) + Send + Sync + 'static {
        let errors = Arc::clone(&self.0);
        move |err: &EngineError| errors.lock().unwrap().push(err.to_string())
    }

    pub(crate) fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Counts level checks
pub(crate) struct CountingTarget {
    pub(crate) filter: StdFilter,
    pub(crate) checks: AtomicUsize,
}

impl CountingTarget {
    pub(crate) fn new(filter: StdFilter) -> Self {
        Self {
            filter,
            checks: AtomicUsize::new(0),
        }
    }

    pub(crate) fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl Target for CountingTarget {
    fn name(&self) -> &str {
        "counting"
    }

    fn is_level_enabled(&self, level: Level) -> LevelStatus {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.filter.status(level)
    }

    fn log(&self, rec: LogRec) {
        if let LogRec::Flush(signal) = rec {
            signal.complete();
        }
    }

    fn shutdown(&self, _deadline: Instant) -> Result<(), ContractError> {
        Ok(())
    }
}

/// Blocks inside `log` for data records until released
///
/// Sends on `entered` each time a record arrives, then waits on `release`.
pub(crate) struct GateTarget {
    entered: Sender<()>,
    release: Receiver<()>,
}

impl GateTarget {
    /// Returns the target, the "entered" receiver and the "release" sender
    pub(crate) fn new() -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        (
            Self {
                entered: entered_tx,
                release: release_rx,
            },
            entered_rx,
            release_tx,
        )
    }
}

impl Target for GateTarget {
    fn name(&self) -> &str {
        "gate"
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

/// Panics on every data record and optionally on shutdown
pub(crate) struct PanicTarget {
    pub(crate) panic_on_shutdown: bool,
}

impl Target for PanicTarget {
    fn name(&self) -> &str {
        "panicker"
    }

    fn is_level_enabled(&self, _level: Level) -> LevelStatus {
        LevelStatus::new(true, false)
    }

    fn log(&self, rec: LogRec) {
        match rec {
            LogRec::Flush(signal) => signal.complete(),
            LogRec::Data(rec) => panic!("cannot write '{}'", rec.msg()),
        }
    }

    fn shutdown(&self, _deadline: Instant) -> Result<(), ContractError> {
        if self.panic_on_shutdown {
            panic!("shutdown exploded");
        }
        Ok(())
    }
}

/// Keeps flush markers without ever completing them
#[derive(Default)]
pub(crate) struct StallTarget {
    held: Mutex<Vec<FlushSignal>>,
}

impl Target for StallTarget {
    fn name(&self) -> &str {
        "stall"
    }

    fn is_level_enabled(&self, _level: Level) -> LevelStatus {
        LevelStatus::new(true, false)
    }

    fn log(&self, rec: LogRec) {
        if let LogRec::Flush(signal) = rec {
            self.held.lock().unwrap().push(signal);
        }
    }

    fn shutdown(&self, _deadline: Instant) -> Result<(), ContractError> {
        Ok(())
    }
}

/// Fails its shutdown with a contract error
pub(crate) struct FailingShutdownTarget {
    pub(crate) name: &'static str,
    pub(crate) timeout: bool,
}

impl Target for FailingShutdownTarget {
    fn name(&self) -> &str {
        self.name
    }

    fn is_level_enabled(&self, _level: Level) -> LevelStatus {
        LevelStatus::DISABLED
    }

    fn log(&self, rec: LogRec) {
        if let LogRec::Flush(signal) = rec {
            signal.complete();
        }
    }

    fn shutdown(&self, _deadline: Instant) -> Result<(), ContractError> {
        if self.timeout {
            Err(ContractError::TargetTimeout {
                target: self.name.to_string(),
                waited_ms: 0,
            })
        } else {
            Err(ContractError::target_shutdown(self.name, "sink unreachable"))
        }
    }
}
