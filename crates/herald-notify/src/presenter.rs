//! Alert presentation.
//!
//! The presenter turns fresh notification records into user-visible side
//! effects: a transient toast, optionally a platform-level notification when
//! permission was granted, and a short chime gated by the persisted sound
//! flag. Platform capabilities live behind the [`AlertSink`] trait so
//! headless and test environments plug in a no-op.
//!
//! Chat alerts carry extra policy: a message for the conversation currently
//! open in the UI is suppressed entirely, messages from the current user
//! never alert, and rapid repeats from one sender are coalesced into the
//! existing unread record instead of spamming one alert per message.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use herald_core::{Clock, StateStore};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::record::NotificationRecord;
use crate::store::NotificationStore;

/// State-store key holding the user-toggleable sound flag.
pub const SOUND_STATE_KEY: &str = "sound_enabled";

/// Platform notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Platform notifications may be raised.
    Granted,
    /// The user declined; degrade to toast-only.
    Denied,
    /// Not asked yet.
    Default,
}

/// Presentation capabilities of the host platform.
pub trait AlertSink: Send + Sync {
    /// Render a transient in-app toast for the record.
    fn toast(&self, record: &NotificationRecord);

    /// Raise a platform-level notification. Returns false when the platform
    /// refused (permission missing, headless).
    fn notify_system(&self, title: &str, body: &str) -> bool;

    /// Current platform notification permission.
    fn permission(&self) -> PermissionState;

    /// Ask the user for notification permission; returns the resulting state.
    fn request_permission(&self) -> PermissionState;

    /// Play a short chime.
    fn play_tone(&self);
}

/// Sink for headless and test environments: everything is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAlertSink;

impl AlertSink for NoopAlertSink {
    fn toast(&self, _record: &NotificationRecord) {}

    fn notify_system(&self, _title: &str, _body: &str) -> bool {
        false
    }

    fn permission(&self) -> PermissionState {
        PermissionState::Default
    }

    fn request_permission(&self) -> PermissionState {
        PermissionState::Denied
    }

    fn play_tone(&self) {}
}

/// Push payload of a `new_message` event.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessagePayload {
    pub message: IncomingMessage,
    pub sender_name: String,
    pub chat_id: String,
}

/// The message body inside a `new_message` event.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Turns records into toasts, platform notifications, and chimes.
pub struct AlertPresenter {
    sink: Arc<dyn AlertSink>,
    state: Arc<dyn StateStore>,
    store: Arc<NotificationStore>,
    clock: Arc<dyn Clock>,
    user_email: String,
    coalesce_window: Duration,
    sound_enabled: AtomicBool,
    current_chat: Mutex<Option<String>>,
}

impl AlertPresenter {
    /// Create a presenter. The sound flag is restored from persisted state;
    /// it defaults to enabled unless the user previously disabled it.
    pub fn new(
        sink: Arc<dyn AlertSink>,
        state: Arc<dyn StateStore>,
        store: Arc<NotificationStore>,
        clock: Arc<dyn Clock>,
        user_email: impl Into<String>,
        coalesce_window: Duration,
    ) -> Self {
        let sound_enabled = state.get(SOUND_STATE_KEY).as_deref() != Some("false");
        Self {
            sink,
            state,
            store,
            clock,
            user_email: user_email.into(),
            coalesce_window,
            sound_enabled: AtomicBool::new(sound_enabled),
            current_chat: Mutex::new(None),
        }
    }

    /// Surface a freshly produced deadline record.
    pub fn present_deadline(&self, record: &NotificationRecord) {
        self.sink.toast(record);
        if self.sink.permission() == PermissionState::Granted {
            self.sink.notify_system(&record.title, &record.message);
        }
    }

    /// Handle an incoming chat message push event: produce a record (or fold
    /// into an existing one) and alert, subject to the suppression rules.
    pub fn handle_new_message(&self, payload: NewMessagePayload) {
        if payload.message.sender == self.user_email {
            return;
        }
        if self.current_chat.lock().unwrap().as_deref() == Some(payload.chat_id.as_str()) {
            debug!(chat_id = %payload.chat_id, "suppressing alert for active chat");
            return;
        }

        let record = NotificationRecord::chat_message(
            &payload.chat_id,
            &payload.message.id,
            &payload.message.sender,
            &payload.sender_name,
            &payload.message.content,
            payload.message.timestamp,
        );

        let now = self.clock.now();
        let coalesced =
            self.store
                .coalesce_chat(&payload.message.sender, &record.message, now, self.coalesce_window);
        if !coalesced && !self.store.add(record.clone()) {
            // Redelivered push event; the record is already in the feed.
            return;
        }

        self.sink.toast(&record);
        if self.sink.permission() == PermissionState::Granted {
            self.sink.notify_system(&record.title, &record.message);
        }
        self.chime();
    }

    /// Produce and surface a change-event record for a local user action.
    pub fn record_change(
        &self,
        actor: &str,
        action: &str,
        item_kind: &str,
        item_name: &str,
        details: &str,
    ) -> NotificationRecord {
        let record =
            NotificationRecord::change_event(actor, action, item_kind, item_name, details, self.clock.now());
        self.store.add(record.clone());
        self.sink.toast(&record);
        self.chime();
        record
    }

    /// Mark `chat_id` as the conversation currently open in the UI.
    pub fn set_current_chat(&self, chat_id: impl Into<String>) {
        *self.current_chat.lock().unwrap() = Some(chat_id.into());
    }

    /// No conversation is open anymore.
    pub fn clear_current_chat(&self) {
        *self.current_chat.lock().unwrap() = None;
    }

    /// The conversation currently open in the UI, if any.
    pub fn current_chat(&self) -> Option<String> {
        self.current_chat.lock().unwrap().clone()
    }

    /// Flip and persist the sound flag; returns the new value.
    pub fn toggle_sound(&self) -> bool {
        let enabled = !self.sound_enabled.load(Ordering::SeqCst);
        self.sound_enabled.store(enabled, Ordering::SeqCst);
        let value = if enabled { "true" } else { "false" };
        if let Err(e) = self.state.put(SOUND_STATE_KEY, value) {
            warn!(error = %e, "failed to persist sound flag");
        }
        enabled
    }

    /// Whether the chime is currently enabled.
    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled.load(Ordering::SeqCst)
    }

    /// Ask for platform notification permission when not yet decided.
    /// Returns whether notifications are now permitted. Denial is a normal
    /// outcome, not an error.
    pub fn request_permission(&self) -> bool {
        match self.sink.permission() {
            PermissionState::Granted => true,
            PermissionState::Denied => false,
            PermissionState::Default => {
                self.sink.request_permission() == PermissionState::Granted
            }
        }
    }

    fn chime(&self) {
        if self.sound_enabled() {
            self.sink.play_tone();
        }
    }
}
