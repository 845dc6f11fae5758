//! External item sources consumed by the notification subsystem.
//!
//! Two read paths feed the deadline poller: the task query (deadline-bearing
//! items for the current user) and the AI-derived task query (batches with
//! nested items that may carry deadlines). A third surface, [`ChatApi`],
//! serves the unread aggregator. All three are traits so tests inject fakes
//! and the poller never knows it is talking HTTP.
//!
//! The task list endpoint is served in several envelope shapes depending on
//! backend version: a bare array, `{"tasks": [...]}` or `{"data": [...]}`.
//! All are accepted.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{NotifyError, Result};

/// A deadline-bearing task as returned by the task query.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub in_trash: bool,
}

impl TaskItem {
    /// Whether this task is still eligible for deadline alerts.
    pub fn is_active(&self) -> bool {
        !self.completed && !self.in_trash
    }
}

/// A batch of AI-derived tasks (one transcription/processing run).
#[derive(Debug, Clone, Deserialize)]
pub struct AiTaskBatch {
    pub id: String,
    #[serde(default)]
    pub items: Vec<AiTaskItem>,
}

/// One AI-derived task. The deadline arrives as a raw string and is parsed
/// per item so one malformed date cannot abort the batch.
#[derive(Debug, Clone, Deserialize)]
pub struct AiTaskItem {
    pub title: String,
    #[serde(default)]
    pub deadline: Option<String>,
}

/// Source of deadline-bearing items for the poller.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Active tasks with a deadline inside `[from, to]`.
    async fn deadline_tasks(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TaskItem>>;

    /// Active AI-derived task batches for the user.
    async fn derived_batches(&self, user_email: &str) -> Result<Vec<AiTaskBatch>>;
}

/// Chat read-state surface for the unread aggregator.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Authoritative unread counts per conversation id.
    async fn unread_counts(&self, user_email: &str) -> Result<HashMap<String, u32>>;

    /// Tell the server a conversation was read.
    async fn mark_chat_read(&self, chat_id: &str, user_email: &str) -> Result<()>;
}

/// REST-backed task source.
pub struct RestTaskSource {
    client: reqwest::Client,
    base_url: String,
}

impl RestTaskSource {
    /// Create a source against the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a source with a shared HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TaskSource for RestTaskSource {
    async fn deadline_tasks(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TaskItem>> {
        let url = format!("{}/api/tasks", self.base_url);
        let value: Value = self
            .client
            .get(&url)
            .query(&[
                ("view", "active".to_string()),
                ("deadline_start", from.to_rfc3339()),
                ("deadline_end", to.to_rfc3339()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tasks_from_envelope(value)
    }

    async fn derived_batches(&self, user_email: &str) -> Result<Vec<AiTaskBatch>> {
        let url = format!("{}/api/ai-tasks", self.base_url);
        let batches = self
            .client
            .get(&url)
            .query(&[("user_email", user_email), ("view", "active")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(batches)
    }
}

/// Accept the task list in any of its known envelope shapes.
fn tasks_from_envelope(value: Value) -> Result<Vec<TaskItem>> {
    let list = if value.is_array() {
        value
    } else if let Some(tasks) = value.get("tasks").filter(|v| v.is_array()) {
        tasks.clone()
    } else if let Some(data) = value.get("data").filter(|v| v.is_array()) {
        data.clone()
    } else {
        return Err(NotifyError::UnexpectedPayload {
            context: "task list".into(),
        });
    };

    Ok(serde_json::from_value(list)?)
}

/// REST-backed chat read-state API.
pub struct RestChatApi {
    client: reqwest::Client,
    base_url: String,
}

impl RestChatApi {
    /// Create an API client against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create an API client with a shared HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ChatApi for RestChatApi {
    async fn unread_counts(&self, user_email: &str) -> Result<HashMap<String, u32>> {
        let url = format!("{}/api/chat/unread", self.base_url);
        let counts = self
            .client
            .get(&url)
            .query(&[("user_email", user_email)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(counts)
    }

    async fn mark_chat_read(&self, chat_id: &str, user_email: &str) -> Result<()> {
        let url = format!("{}/api/chat/rooms/{chat_id}/read", self.base_url);
        self.client
            .patch(&url)
            .json(&serde_json::json!({ "user_email": user_email }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
