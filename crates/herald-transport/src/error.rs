//! Error types for the event transport.
//!
//! Connection failures are handled inside the transport (logged, retried)
//! and never surfaced to callers; these errors only describe frame-level
//! problems on the wire.

use thiserror::Error;

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A frame could not be serialized for sending
    #[error("Failed to encode frame for event '{event}': {source}")]
    Encode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// An incoming line was not a valid event frame
    #[error("Failed to decode frame: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },

    /// A frame arrived without an event name
    #[error("Frame has an empty event name")]
    MissingEvent,
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
