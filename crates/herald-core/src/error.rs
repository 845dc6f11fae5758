//! Error types for HERALD operations.
//!
//! This module defines [`HeraldError`], the error enum shared across the
//! HERALD crates. The notification subsystem is silent-by-design towards the
//! embedding UI: errors are logged and handled locally, so these types mostly
//! travel between internal layers rather than up to a user-facing surface.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`HeraldError`].
pub type Result<T> = std::result::Result<T, HeraldError>;

/// Error type for core HERALD operations.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error
    #[error("JSON parse error in {context}: {message}")]
    JsonParse {
        context: String,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Internal error (bug in HERALD)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl HeraldError {
    /// Create an I/O error
    pub fn io(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a JSON parse error
    pub fn json_parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            context: context.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error only affects persisted state, not live
    /// behavior. State errors degrade to in-memory defaults (e.g. an empty
    /// dedup ledger) rather than stopping the notification feed.
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::JsonParse { .. })
    }
}
