//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{EngineConfig, LevelCacheKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

/// Resolved values, after defaults are applied
#[derive(Serialize)]
struct ConfigSummary {
    queue_capacity: usize,
    enqueue_timeout_ms: u64,
    flush_timeout_ms: u64,
    shutdown_timeout_ms: u64,
    level_cache: LevelCacheKind,
    buffer_pool: bool,
    max_pooled_buffer: usize,
    metrics_update_freq_ms: u64,
}

impl From<&EngineConfig> for ConfigSummary {
    fn from(config: &EngineConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity(),
            enqueue_timeout_ms: config.enqueue_timeout().as_millis() as u64,
            flush_timeout_ms: config.flush_timeout().as_millis() as u64,
            shutdown_timeout_ms: config.shutdown_timeout().as_millis() as u64,
            level_cache: config.level_cache,
            buffer_pool: !config.disable_buffer_pool,
            max_pooled_buffer: config.max_pooled_buffer(),
            metrics_update_freq_ms: config.metrics_update_freq().as_millis() as u64,
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = config_loader::warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary::from(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn print_validation_result(result: &ValidationResult) {
    if !result.valid {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
        return;
    }

    println!("✓ Configuration is valid: {}", result.config_path);

    if let Some(ref summary) = result.summary {
        println!("\n  Queue capacity: {}", summary.queue_capacity);
        println!("  Enqueue timeout: {}ms", summary.enqueue_timeout_ms);
        println!("  Flush timeout: {}ms", summary.flush_timeout_ms);
        println!("  Shutdown timeout: {}ms", summary.shutdown_timeout_ms);
        println!("  Level cache: {:?}", summary.level_cache);
        if summary.buffer_pool {
            println!("  Buffer pool: up to {} bytes", summary.max_pooled_buffer);
        } else {
            println!("  Buffer pool: disabled");
        }
        println!("  Metrics interval: {}ms", summary.metrics_update_freq_ms);
    }

    if let Some(ref warnings) = result.warnings {
        println!("\n⚠ Warnings:");
        for warning in warnings {
            println!("  - {warning}");
        }
    }
}
