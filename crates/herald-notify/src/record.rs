//! The notification record: the canonical unit of the feed.
//!
//! Record ids are derived deterministically from the originating entity and
//! the deadline instant, so independently racing producers (poller ticks,
//! push events redelivered after a reconnect) regenerate the same id and the
//! store/ledger can deduplicate them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum characters of message content shown in a chat notification body.
pub const MAX_MESSAGE_PREVIEW: usize = 50;

/// Kind of notification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A task deadline entered the alert window.
    DeadlineTask,
    /// An AI-derived task deadline entered the alert window.
    DeadlineAiTask,
    /// An incoming chat message.
    ChatMessage,
    /// A local change performed by a user (created/updated/deleted something).
    ChangeEvent,
}

impl NotificationKind {
    /// Whether this kind carries a deadline.
    pub fn is_deadline(&self) -> bool {
        matches!(self, Self::DeadlineTask | Self::DeadlineAiTask)
    }

    /// Default alert title for this kind.
    pub fn title(&self) -> &'static str {
        match self {
            Self::DeadlineTask => "Task Deadline Alert",
            Self::DeadlineAiTask => "AI Task Deadline Alert",
            Self::ChatMessage => "New Message",
            Self::ChangeEvent => "Workspace Change",
        }
    }
}

/// Opaque back-reference to the entity a record was produced from, used for
/// click-through navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "ref")]
pub enum SourceRef {
    /// A deadline-bearing task.
    Task { task_id: String },
    /// One item of an AI-derived task batch.
    AiTask { batch_id: String, index: usize },
    /// A chat message within a conversation.
    Chat {
        chat_id: String,
        message_id: String,
        sender: String,
    },
    /// No originating entity (e.g. change events).
    None,
}

/// A single entry of the notification feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Globally unique, deterministic id. Immutable once created.
    pub id: String,
    /// Record kind.
    pub kind: NotificationKind,
    /// Display title.
    pub title: String,
    /// Display body.
    pub message: String,
    /// Creation time (not the deadline time).
    pub timestamp: DateTime<Utc>,
    /// When the underlying item is due; deadline kinds only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// Read state; transitions false -> true only.
    pub read: bool,
    /// Presentation hint.
    pub priority: bool,
    /// Back-reference to the originating entity.
    pub source: SourceRef,
}

impl NotificationRecord {
    /// Record for a task whose deadline entered the alert window.
    pub fn deadline_task(
        task_id: &str,
        task_title: &str,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("task_{}_{}", task_id, deadline.timestamp_millis()),
            kind: NotificationKind::DeadlineTask,
            title: NotificationKind::DeadlineTask.title().to_string(),
            message: due_in_message(task_title, deadline, now),
            timestamp: now,
            deadline: Some(deadline),
            read: false,
            priority: false,
            source: SourceRef::Task {
                task_id: task_id.to_string(),
            },
        }
    }

    /// Record for an AI-derived task item whose deadline entered the window.
    pub fn deadline_ai_task(
        batch_id: &str,
        index: usize,
        item_title: &str,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!(
                "ai_task_{}_{}_{}",
                batch_id,
                index,
                deadline.timestamp_millis()
            ),
            kind: NotificationKind::DeadlineAiTask,
            title: NotificationKind::DeadlineAiTask.title().to_string(),
            message: due_in_message(item_title, deadline, now),
            timestamp: now,
            deadline: Some(deadline),
            read: false,
            priority: false,
            source: SourceRef::AiTask {
                batch_id: batch_id.to_string(),
                index,
            },
        }
    }

    /// Record for an incoming chat message.
    pub fn chat_message(
        chat_id: &str,
        message_id: &str,
        sender: &str,
        sender_name: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("message_{message_id}"),
            kind: NotificationKind::ChatMessage,
            title: format!("New message from {sender_name}"),
            message: truncate_preview(content),
            timestamp,
            deadline: None,
            read: false,
            priority: false,
            source: SourceRef::Chat {
                chat_id: chat_id.to_string(),
                message_id: message_id.to_string(),
                sender: sender.to_string(),
            },
        }
    }

    /// Record for a local workspace change.
    pub fn change_event(
        actor: &str,
        action: &str,
        item_kind: &str,
        item_name: &str,
        details: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let message = if details.is_empty() {
            format!("{actor} {action} {item_kind}: {item_name}")
        } else {
            format!("{actor} {action} {item_kind}: {item_name} - {details}")
        };

        Self {
            id: format!("change_{}_{}", item_name, now.timestamp_millis()),
            kind: NotificationKind::ChangeEvent,
            title: format!("{action} {item_kind}"),
            message,
            timestamp: now,
            deadline: None,
            read: false,
            priority: false,
            source: SourceRef::None,
        }
    }

    /// Conversation id for chat records.
    pub fn chat_id(&self) -> Option<&str> {
        match &self.source {
            SourceRef::Chat { chat_id, .. } => Some(chat_id),
            _ => None,
        }
    }

    /// Sender identifier for chat records.
    pub fn chat_sender(&self) -> Option<&str> {
        match &self.source {
            SourceRef::Chat { sender, .. } => Some(sender),
            _ => None,
        }
    }
}

/// `"<title>" is due in N minutes`, N rounded up.
fn due_in_message(title: &str, deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = minutes_until(now, deadline);
    format!("\"{title}\" is due in {minutes} minutes")
}

/// Whole minutes until `deadline`, rounded up. Callers only pass future
/// deadlines; a past deadline clamps to zero.
pub fn minutes_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> i64 {
    let secs = (deadline - now).num_seconds().max(0);
    (secs as u64).div_ceil(60) as i64
}

/// Truncate chat content to the preview length, appending an ellipsis.
pub fn truncate_preview(content: &str) -> String {
    if content.chars().count() <= MAX_MESSAGE_PREVIEW {
        return content.to_string();
    }
    let truncated: String = content.chars().take(MAX_MESSAGE_PREVIEW).collect();
    format!("{truncated}...")
}
