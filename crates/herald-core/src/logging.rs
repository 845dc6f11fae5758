//! Logging infrastructure for HERALD.
//!
//! This module provides structured logging using the `tracing` ecosystem.
//! The notification subsystem never surfaces errors to the UI layer, so the
//! log is the only place failures (fetch errors, reconnect attempts, skipped
//! malformed items) become visible.
//!
//! ## Features
//!
//! - JSON lines format for machine parsing
//! - File output to `~/.herald/logs/herald.log`
//! - Console output with configurable verbosity
//! - `--verbose` flag support for debug logging
//!
//! ## Example
//!
//! ```no_run
//! use herald_core::logging;
//!
//! // Initialize logging (call once at startup)
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! // Use tracing macros
//! tracing::info!("notification service started");
//! tracing::debug!(chat_id = "room-42", "suppressing alert for active chat");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{HeraldError, Result};

/// Guard that must be held to ensure log flushing on shutdown.
///
/// When this guard is dropped, it flushes any pending log entries.
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the HERALD logging system.
///
/// This sets up:
/// - File logging to `~/.herald/logs/herald.log` (JSON lines format)
/// - Console logging to stderr (human-readable format)
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.herald/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses INFO.
///
/// # Returns
///
/// A [`LogGuard`] that must be held for the application lifetime to ensure
/// logs are properly flushed on shutdown.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| HeraldError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    // Set up file appender for JSON logs
    let file_appender = tracing_appender::rolling::daily(&log_dir, "herald.log");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    // Determine log level based on verbose flag and environment
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("herald={default_level}")));

    // JSON layer for file output
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    // Human-readable layer for console output
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for testing.
///
/// This is a simpler alternative to [`init_logging`] that only logs to stderr.
/// Useful for tests and development.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Get the default HERALD state directory (`~/.herald/`).
pub fn default_state_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| HeraldError::Internal {
        message: "could not determine home directory".into(),
    })?;

    Ok(home.join(".herald"))
}

/// Get the default log directory path.
///
/// Returns `~/.herald/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(default_state_dir()?.join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_dir_is_under_state_dir() {
        let state = default_state_dir().unwrap();
        let logs = default_log_dir().unwrap();
        assert!(logs.starts_with(&state));
        assert!(logs.ends_with("logs"));
    }

    #[test]
    fn test_init_test_logging() {
        // Should not panic
        init_test_logging();
    }
}
