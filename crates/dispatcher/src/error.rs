//! Engine error types

use std::time::Duration;

use thiserror::Error;

/// Engine errors
///
/// Producer-facing calls never return these; they go through the error hook.
/// Coordinator calls (`flush`, `shutdown`, `register_target`) return them.
#[derive(Debug, Error)]
pub enum EngineError {
    // ===== Queue timeouts =====
    /// Blocking enqueue did not complete in time, the record was lost
    #[error("enqueue timed out after {timeout:?} for {level} record: {msg}")]
    EnqueueTimeout {
        level: String,
        msg: String,
        timeout: Duration,
    },

    /// Coordinated operation did not complete before its deadline
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    // ===== Target failures =====
    /// Target failed to shut down
    #[error("target '{target}' shutdown failed: {source}")]
    TargetShutdown {
        target: String,
        #[source]
        source: contracts::ContractError,
    },

    /// Target panicked while handling a call
    #[error("target '{target}' panicked: {message}")]
    TargetPanic { target: String, message: String },

    // ===== Misuse =====
    /// No target was ever registered, so there is no queue yet
    #[error("register_target must be called before records can be enqueued")]
    NotInitialized,

    /// Shutdown called again after the engine was shut down
    #[error("shutdown called again after shut down")]
    AlreadyShutDown,

    /// Operation refused because the engine is shut down
    #[error("engine is shut down")]
    ShutDown,

    // ===== Aggregate =====
    /// Every failure collected during shutdown
    #[error("{}", join(.0))]
    Aggregate(Vec<EngineError>),

    // ===== Internal =====
    /// Level id does not fit the level cache
    #[error("level id {level_id} exceeds level cache capacity {capacity}")]
    LevelCache { level_id: u32, capacity: u32 },

    /// Consumer loop body panicked and was relaunched
    #[error("consumer loop panicked: {0}")]
    LoopPanic(String),

    /// Flush sentinel was dropped before the consumer completed it
    #[error("flush aborted before completion")]
    FlushAborted,

    /// Worker thread could not be spawned
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Error from contract
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl EngineError {
    /// Create a target panic error
    pub fn target_panic(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TargetPanic {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Whether a deadline expired, as opposed to a target reporting failure
    ///
    /// An aggregate is a timeout when any of its members is.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::EnqueueTimeout { .. } | Self::Timeout { .. } => true,
            Self::Contract(e) | Self::TargetShutdown { source: e, .. } => e.is_timeout(),
            Self::Aggregate(errs) => errs.iter().any(EngineError::is_timeout),
            _ => false,
        }
    }

    /// Member errors of an aggregate, or this error alone
    pub fn errors(&self) -> &[EngineError] {
        match self {
            Self::Aggregate(errs) => errs,
            other => std::slice::from_ref(other),
        }
    }
}

fn join(errs: &[EngineError]) -> String {
    errs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Render a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_display_and_timeout() {
        let err = EngineError::Aggregate(vec![
            EngineError::target_panic("file", "disk full"),
            EngineError::Timeout {
                operation: "shutdown",
                timeout: Duration::from_millis(5),
            },
        ]);
        let text = err.to_string();
        assert!(text.contains("disk full"), "got: {text}");
        assert!(text.contains("shutdown timed out"), "got: {text}");
        assert!(err.is_timeout());
        assert_eq!(err.errors().len(), 2);
    }

    #[test]
    fn test_target_error_is_not_timeout() {
        let err = EngineError::target_panic("net", "refused");
        assert!(!err.is_timeout());
        assert_eq!(err.errors().len(), 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("bad");
        assert_eq!(panic_message(payload.as_ref()), "bad");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("worse"));
        assert_eq!(panic_message(payload.as_ref()), "worse");
    }
}
