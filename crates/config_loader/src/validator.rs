//! Configuration validation
//!
//! Rules:
//! - every field within its `validator` range
//! - flush timeout not longer than the shutdown timeout
//!
//! Settings that are legal but have no effect are reported by [`warnings`].

use std::time::Duration;

use contracts::{ContractError, EngineConfig};
use validator::{Validate, ValidationErrors};

/// Returns the first error encountered
pub fn validate(config: &EngineConfig) -> Result<(), ContractError> {
    config.validate().map_err(first_range_error)?;
    validate_timeouts(config)?;
    Ok(())
}

fn first_range_error(errors: ValidationErrors) -> ContractError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    match fields.first() {
        Some((field, errs)) => {
            let message = errs
                .first()
                .map(|e| match e.params.get("max") {
                    Some(max) => format!("{} exceeds maximum {max}", e.code),
                    None => e.code.to_string(),
                })
                .unwrap_or_else(|| "invalid value".to_string());
            ContractError::config_validation(field.to_string(), message)
        }
        None => ContractError::config_validation("<root>", errors.to_string()),
    }
}

fn validate_timeouts(config: &EngineConfig) -> Result<(), ContractError> {
    let flush = config.flush_timeout();
    let shutdown = config.shutdown_timeout();
    if flush > shutdown {
        return Err(ContractError::config_validation(
            "flush_timeout_ms",
            format!(
                "flush timeout ({}ms) must not exceed shutdown timeout ({}ms)",
                flush.as_millis(),
                shutdown.as_millis()
            ),
        ));
    }
    Ok(())
}

/// Legal settings that will be ignored at runtime
pub fn warnings(config: &EngineConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.disable_buffer_pool && config.max_pooled_buffer != 0 {
        warnings.push(format!(
            "max_pooled_buffer = {} has no effect while disable_buffer_pool is set",
            config.max_pooled_buffer
        ));
    }
    let requested = Duration::from_millis(config.metrics_update_freq_ms);
    if config.metrics_update_freq_ms != 0 && config.metrics_update_freq() > requested {
        warnings.push(format!(
            "metrics_update_freq_ms = {} is below the minimum, {}ms is used",
            config.metrics_update_freq_ms,
            config.metrics_update_freq().as_millis()
        ));
    }
    if config.max_queue_size < 0 {
        warnings.push(
            "negative max_queue_size makes the intake queue a rendezvous channel".to_string(),
        );
    }

    warnings
}
