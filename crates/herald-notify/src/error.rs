//! Error types for the notification subsystem.
//!
//! These errors stay inside the subsystem: the poller and aggregator catch
//! them per source, log, and degrade to empty results, so nothing here ever
//! reaches the embedding UI.

use std::path::PathBuf;

use thiserror::Error;

/// Notification subsystem errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A response arrived in none of the accepted shapes
    #[error("Unexpected payload shape in {context}")]
    UnexpectedPayload { context: String },

    /// Configuration file exists but does not parse
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NotifyError {
    /// Check if this error is a transient network condition.
    ///
    /// Transient failures are treated as "zero items this tick" and retried
    /// implicitly on the next interval.
    pub fn is_transient(&self) -> bool {
        match self {
            NotifyError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            NotifyError::Io(_) => true,
            _ => false,
        }
    }

    /// Check if this error came from the network layer at all.
    pub fn is_network_error(&self) -> bool {
        matches!(self, NotifyError::Http(_) | NotifyError::Io(_))
    }
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
