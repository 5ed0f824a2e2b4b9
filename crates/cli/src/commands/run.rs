//! `run` command implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{EngineConfig, StdFilter, PANIC};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{LoadConfig, LoadGenerator};

/// Execute the `run` command
pub async fn run_load(args: &RunArgs) -> Result<()> {
    let engine_config = load_engine_config(args)?;

    info!(
        queue_capacity = engine_config.queue_capacity(),
        enqueue_timeout_ms = engine_config.enqueue_timeout().as_millis() as u64,
        flush_timeout_ms = engine_config.flush_timeout().as_millis() as u64,
        level_cache = ?engine_config.level_cache,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let load = LoadConfig {
        producers: args.producers,
        records_per_producer: args.records,
        flush_every: args.flush_every,
        drop_on_full: args.drop_on_full,
        console_filter: StdFilter::new(args.console_level.into(), PANIC),
        stacktrace: args.stacktrace_level.map_or(PANIC, Into::into),
        export_metrics: args.metrics_port != 0,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let watcher = tokio::spawn({
        let stop = Arc::clone(&stop);
        async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, stopping producers...");
            stop.store(true, Ordering::Relaxed);
        }
    });

    info!("Starting load run...");
    let result = LoadGenerator::new(engine_config, load)
        .run(Arc::clone(&stop))
        .await;
    watcher.abort();

    let stats = result.context("Load run failed")?;
    if args.json {
        let json = serde_json::to_string_pretty(&stats).context("Failed to serialize run stats")?;
        println!("{json}");
    } else {
        stats.print_summary();
    }

    if stop.load(Ordering::Relaxed) {
        info!("logfan stopped early");
    } else {
        info!("logfan finished");
    }
    Ok(())
}

fn load_engine_config(args: &RunArgs) -> Result<EngineConfig> {
    let Some(path) = &args.config else {
        info!("No configuration file given, using defaults");
        return Ok(EngineConfig::default());
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
