//! Layered error definitions
//!
//! Categorized by source: config / target / metrics

use thiserror::Error;

/// Unified contract error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Target Errors =====
    /// Target write error
    #[error("target '{target}' write error: {message}")]
    TargetWrite { target: String, message: String },

    /// Target shutdown error
    #[error("target '{target}' shutdown error: {message}")]
    TargetShutdown { target: String, message: String },

    /// Target deadline expired
    #[error("target '{target}' timed out after {waited_ms}ms")]
    TargetTimeout { target: String, waited_ms: u64 },

    // ===== Metrics Errors =====
    /// Metrics backend rejected a handle request
    #[error("metrics error for '{target}': {message}")]
    Metrics { target: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create target write error
    pub fn target_write(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TargetWrite {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create target shutdown error
    pub fn target_shutdown(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TargetShutdown {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create metrics error
    pub fn metrics(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Metrics {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Whether this error reports an expired deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TargetTimeout { .. })
    }
}
