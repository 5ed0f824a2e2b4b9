//! Consumer loop - drains the intake queue and fans records out to targets
//!
//! A single consumer thread runs under a supervisor that catches any panic
//! escaping the loop body, reports it and relaunches the loop on the same
//! queue. Each target call is isolated on its own.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use contracts::{ContractError, FlushSignal, LogRec, Record};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, instrument, warn};

use crate::engine::Inner;
use crate::error::{panic_message, EngineError};

/// Spawn the supervised consumer thread
///
/// `done` is dropped when the loop exits for good, which is what
/// shutdown waits on.
pub(crate) fn spawn_consumer(
    inner: Arc<Inner>,
    queue: Receiver<LogRec>,
    done: Sender<()>,
) -> Result<(), EngineError> {
    thread::Builder::new()
        .name("logfan-consumer".into())
        .spawn(move || {
            supervise(&inner, &queue);
            drop(done);
        })
        .map(|_| ())
        .map_err(|source| EngineError::Spawn {
            name: "consumer",
            source,
        })
}

#[instrument(name = "consumer_supervisor", skip_all)]
fn supervise(inner: &Inner, queue: &Receiver<LogRec>) {
    debug!("Consumer started");
    let mut restarts: u64 = 0;

    loop {
        match panic::catch_unwind(AssertUnwindSafe(|| run(inner, queue))) {
            Ok(records) => {
                info!(records, restarts, "Intake queue closed, consumer stopped");
                return;
            }
            Err(payload) => {
                restarts += 1;
                inner.report_error(EngineError::LoopPanic(panic_message(payload.as_ref())));
                warn!(restarts, "Relaunching consumer loop");
            }
        }
    }
}

/// Returns once the queue is closed and drained
fn run(inner: &Inner, queue: &Receiver<LogRec>) -> u64 {
    let mut records: u64 = 0;

    for rec in queue.iter() {
        match rec {
            LogRec::Flush(signal) => flush(inner, queue, signal),
            LogRec::Data(rec) => {
                rec.prep();
                fanout(inner, &rec);
                records += 1;
            }
        }
    }

    records
}

/// Push one record to every target that accepts its level
fn fanout(inner: &Inner, rec: &Arc<Record>) {
    let mut logged = false;

    for target in inner.read_targets().iter() {
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
            if target.is_level_enabled(rec.level()).enabled {
                target.log(LogRec::Data(Arc::clone(rec)));
                true
            } else {
                false
            }
        }));

        match delivered {
            Ok(true) => logged = true,
            Ok(false) => {}
            Err(payload) => inner.report_error(EngineError::target_panic(
                target.name(),
                format!("fanout failed: {}", panic_message(payload.as_ref())),
            )),
        }
    }

    if logged {
        if let Some(metrics) = &inner.metrics {
            metrics.logged.inc();
        }
    }
}

/// Drain what is already queued, then flush every target in order
///
/// Completes `signal`, and any sentinel found while draining, only after
/// every target acknowledged its own flush marker or timed out.
#[instrument(name = "consumer_flush", skip_all)]
fn flush(inner: &Inner, queue: &Receiver<LogRec>, signal: FlushSignal) {
    let mut pending = vec![signal];
    let mut drained: u64 = 0;

    while let Ok(rec) = queue.try_recv() {
        match rec {
            LogRec::Data(rec) => {
                rec.prep();
                fanout(inner, &rec);
                drained += 1;
            }
            LogRec::Flush(signal) => pending.push(signal),
        }
    }

    let timeout = inner.config.flush_timeout();
    for target in inner.read_targets().iter() {
        let (marker, ack) = LogRec::flush();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| target.log(marker))) {
            inner.report_error(EngineError::target_panic(
                target.name(),
                format!("flush failed: {}", panic_message(payload.as_ref())),
            ));
            continue;
        }

        // A dropped marker releases the wait just like a completed one
        if let Err(RecvTimeoutError::Timeout) = ack.recv_timeout(timeout) {
            inner.report_error(EngineError::Contract(ContractError::TargetTimeout {
                target: target.name().to_string(),
                waited_ms: timeout.as_millis() as u64,
            }));
        }
    }

    debug!(drained, sentinels = pending.len(), "Flush complete");
    for signal in pending {
        signal.complete();
    }
}
