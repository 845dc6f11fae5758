//! # herald-transport
//!
//! Reconnecting push-event channel for the HERALD notification subsystem.
//!
//! This crate provides:
//! - [`EventTransport`] - one live server connection with named-event
//!   handler dispatch, fire-and-forget emit, and bounded auto-reconnect
//! - [`frame::EventFrame`] - the newline-delimited JSON wire frame
//! - [`frame::events`] - well-known event names
//!
//! The transport owns no payload semantics; it delivers raw JSON values to
//! registered handlers in arrival order.

pub mod error;
pub mod frame;
pub mod transport;

// Re-export main types for convenience
pub use error::TransportError;
pub use frame::{EventFrame, events};
pub use transport::{ConnectionState, EventHandler, EventTransport, TransportConfig};
