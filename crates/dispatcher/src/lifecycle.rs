//! Flush and shutdown coordination
//!
//! Both protocols inject a sentinel or a close into the same ordered path the
//! producers use, then wait under a deadline.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use contracts::LogRec;
use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, instrument, warn};

use crate::engine::Engine;
use crate::error::{panic_message, EngineError};

impl Engine {
    /// Flush the intake queue and every target
    ///
    /// Blocks until all records enqueued before this call have been pushed to
    /// the targets and each target acknowledged its own flush marker.
    /// Records enqueued concurrently by other producers may or may not be
    /// included.
    ///
    /// # Errors
    /// - `Timeout` when the flush deadline expires (see [`EngineError::is_timeout`])
    /// - `ShutDown` after shutdown
    #[instrument(name = "engine_flush", skip(self))]
    pub fn flush(&self) -> Result<(), EngineError> {
        if !self.has_targets() {
            return Ok(());
        }

        // Excludes registrations and cache resets for the duration
        let lifecycle = self.inner.write_lifecycle();
        if lifecycle.shutdown {
            return Err(EngineError::ShutDown);
        }

        let timeout = self.inner.config.flush_timeout();
        let deadline = Instant::now() + timeout;

        // The sentinel shares the flush deadline rather than the enqueue timeout
        let (sentinel, done) = LogRec::flush();
        if !self.inner.enqueue_until(sentinel, deadline)? {
            return Err(EngineError::Timeout {
                operation: "flush",
                timeout,
            });
        }

        match done.recv_deadline(deadline) {
            Ok(()) => {
                debug!("Flush acknowledged");
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout {
                operation: "flush",
                timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::FlushAborted),
        }
    }

    /// Stop the engine after draining the queue to every target
    ///
    /// Irreversible: level checks report disabled and registration is
    /// refused from here on. Every target is asked to shut down even when an
    /// earlier one fails; all failures come back together.
    ///
    /// # Errors
    /// - `AlreadyShutDown` on every call after the first
    /// - `Aggregate` with queue timeouts and target failures
    #[instrument(name = "engine_shutdown", skip(self))]
    pub fn shutdown(&self) -> Result<(), EngineError> {
        let updater = {
            let mut lifecycle = self.inner.write_lifecycle();
            if lifecycle.shutdown {
                return Err(EngineError::AlreadyShutDown);
            }
            lifecycle.shutdown = true;
            self.inner.clear_level_cache();
            lifecycle.metrics_stop.take();
            lifecycle.metrics_updater.take()
        };

        if let Some(handle) = updater {
            if handle.join().is_err() {
                warn!("Metrics updater panicked");
            }
        }

        let timeout = self.inner.config.shutdown_timeout();
        let deadline = Instant::now() + timeout;
        let mut errors = Vec::new();

        if let Some(rt) = self.inner.runtime() {
            rt.close();
            if let Err(RecvTimeoutError::Timeout) = rt.done.recv_deadline(deadline) {
                errors.push(EngineError::Timeout {
                    operation: "intake queue drain",
                    timeout,
                });
            }
        }

        for target in self.inner.read_targets().iter() {
            match panic::catch_unwind(AssertUnwindSafe(|| target.shutdown(deadline))) {
                Ok(Ok(())) => {}
                Ok(Err(source)) => errors.push(EngineError::TargetShutdown {
                    target: target.name().to_string(),
                    source,
                }),
                Err(payload) => errors.push(EngineError::target_panic(
                    target.name(),
                    format!("shutdown failed: {}", panic_message(payload.as_ref())),
                )),
            }
        }

        if errors.is_empty() {
            info!("Engine shutdown complete");
            Ok(())
        } else {
            warn!(errors = errors.len(), "Engine shutdown completed with errors");
            Err(EngineError::Aggregate(errors))
        }
    }
}
