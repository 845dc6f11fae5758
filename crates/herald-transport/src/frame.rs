//! Wire frames for the event transport.
//!
//! The transport carries newline-delimited JSON frames of the shape
//! `{"event": "<name>", "data": <payload>}`. The payload is opaque to the
//! transport; consumers decode it into their own types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TransportError};

/// Well-known event names delivered over the transport.
pub mod events {
    /// Sent by the client after every (re)connect to join the broadcast scope.
    pub const JOIN_ROOM: &str = "join_room";
    /// A new chat message for some conversation the user participates in.
    pub const NEW_MESSAGE: &str = "new_message";
    /// Per-conversation unread counter increment.
    pub const CHAT_NEW_MESSAGE: &str = "chat:new_message";
    /// A conversation was read (clears its unread counter).
    pub const CHAT_READ: &str = "chat:read";
    /// Another participant is typing.
    pub const USER_TYPING: &str = "user_typing";
    /// Presence roster update.
    pub const ONLINE_USERS: &str = "online_users";
}

/// A single named event with its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event name, used for handler dispatch.
    pub event: String,
    /// Opaque payload; `null` when the event carries none.
    #[serde(default)]
    pub data: Value,
}

impl EventFrame {
    /// Create a frame for the given event and payload.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Serialize to a single wire line (without the trailing newline).
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TransportError::Encode {
            event: self.event.clone(),
            source: e,
        })
    }

    /// Parse a wire line into a frame.
    pub fn decode(line: &str) -> Result<Self> {
        let frame: Self =
            serde_json::from_str(line).map_err(|e| TransportError::Decode { source: e })?;

        if frame.event.is_empty() {
            return Err(TransportError::MissingEvent);
        }

        Ok(frame)
    }
}
