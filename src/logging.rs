//! Logging initialization for the wizard.
//!
//! File mode: logs to `<state>/logs/survey-wizard-{datetime}.log`
//! Otherwise: logs to stderr

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Guard that must be kept alive for the duration of the program.
    /// When dropped, ensures all buffered logs are flushed.
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file (only set when file logging is enabled)
    pub log_file_path: Option<PathBuf>,
}

/// Build the log file name for a given timestamp
pub fn log_file_name(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    format!("survey-wizard-{}.log", timestamp.format("%Y%m%dT%H%M%SZ"))
}

/// Where `init_logging` writes for a session started at `timestamp`.
///
/// `None` means logs go to stderr.
pub fn log_file_path(
    config: &Config,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> Option<PathBuf> {
    config
        .logging
        .to_file
        .then(|| config.logs_path().join(log_file_name(timestamp)))
}

/// Initialize logging based on configuration.
///
/// `debug_override` comes from the `--debug` flag and forces the "debug" level.
/// `RUST_LOG` still wins over both.
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let log_level = if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };

    let filter = tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or(log_level));

    let started = chrono::Utc::now();
    if let Some(log_file_path) = log_file_path(config, started) {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)?;
        let log_filename = log_file_name(started);

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false) // No ANSI codes in log files
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}
