//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use contracts::{Level, DEBUG, ERROR, INFO, TRACE, WARN};

/// logfan - asynchronous log fan-out engine
#[derive(Parser, Debug)]
#[command(
    name = "logfan",
    author,
    version,
    about = "Drive and validate the logfan log distribution engine",
    long_about = "Runs a configurable load against the logfan engine: producer threads \n\
                  log through a bounded intake queue that a single consumer fans out \n\
                  to a console target and a counting target, then flushes and shuts down."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LOGFAN_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LOGFAN_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate load through the engine and report what happened
    Run(RunArgs),

    /// Validate an engine configuration file without running
    Validate(ValidateArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Engine configuration file (TOML or JSON); defaults apply when absent
    #[arg(short, long, env = "LOGFAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of producer threads
    #[arg(long, default_value = "4", env = "LOGFAN_PRODUCERS")]
    pub producers: usize,

    /// Records logged by each producer
    #[arg(long, default_value = "10000", env = "LOGFAN_RECORDS")]
    pub records: u64,

    /// Flush after this many records per producer (0 = only at the end)
    #[arg(long, default_value = "0")]
    pub flush_every: u64,

    /// Drop records instead of blocking when the intake queue is full
    #[arg(long)]
    pub drop_on_full: bool,

    /// Most verbose level forwarded to the console target
    #[arg(long, value_enum, default_value = "warn")]
    pub console_level: LevelArg,

    /// Levels at or above this severity carry a stack trace
    #[arg(long, value_enum)]
    pub stacktrace_level: Option<LevelArg>,

    /// Prometheus exporter port (0 = disabled)
    #[arg(long, default_value = "0", env = "LOGFAN_METRICS_PORT")]
    pub metrics_port: u16,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Validate configuration and exit without generating load
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "logfan.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LevelArg> for Level {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Error => ERROR,
            LevelArg::Warn => WARN,
            LevelArg::Info => INFO,
            LevelArg::Debug => DEBUG,
            LevelArg::Trace => TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["logfan", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.producers, 4);
        assert_eq!(args.records, 10_000);
        assert_eq!(args.console_level, LevelArg::Warn);
        assert!(args.config.is_none());
        assert!(!args.drop_on_full);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["logfan", "-v", "-q", "run"]).is_err());
    }

    #[test]
    fn test_level_arg_maps_to_level() {
        assert_eq!(Level::from(LevelArg::Debug), DEBUG);
        assert_eq!(Level::from(LevelArg::Error), ERROR);
    }
}
