//! Tracing setup.
//!
//! Logs go to a daily-rolling file under the log directory so stdout stays
//! free for the chat. `RUST_LOG` overrides the configured level.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Log file prefix; the appender adds the date suffix.
pub const LOG_FILE_PREFIX: &str = "nipbot.log";

/// Filter directive for a configured level and `-v` count.
pub fn filter_directive(level: &str, verbosity: u8) -> String {
    match verbosity {
        0 => {
            let level = level.trim();
            if level.is_empty() {
                "info".to_string()
            } else {
                level.to_string()
            }
        }
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Installs the global subscriber. Keep the returned guard alive until exit
/// so buffered lines are flushed.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already set.
pub fn init(config: &LoggingConfig, verbosity: u8) -> Result<WorkerGuard> {
    let directory = config.effective_directory();
    init_in(&directory, &filter_directive(&config.level, verbosity))
}

fn init_in(directory: &Path, directive: &str) -> Result<WorkerGuard> {
    fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

    let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(directory = %directory.display(), directive, "logging initialized");
    Ok(guard)
}
