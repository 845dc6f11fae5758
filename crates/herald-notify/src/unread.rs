//! Per-conversation and global unread counters.
//!
//! Counters are derived from two inputs: push events on the transport
//! (`chat:new_message` increments, `chat:read` clears) and authoritative
//! server counts fetched on demand. The store-derived count of unread chat
//! records is the floor for both, so a badge never shows less than what the
//! feed itself holds.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::sources::ChatApi;
use crate::store::NotificationStore;

/// Badge counter and presence source for chat conversations.
pub struct UnreadAggregator {
    store: Arc<NotificationStore>,
    chat_api: Arc<dyn ChatApi>,
    user_email: String,
    counts: Mutex<HashMap<String, u32>>,
    online: Mutex<Vec<String>>,
}

impl UnreadAggregator {
    pub fn new(
        store: Arc<NotificationStore>,
        chat_api: Arc<dyn ChatApi>,
        user_email: impl Into<String>,
    ) -> Self {
        Self {
            store,
            chat_api,
            user_email: user_email.into(),
            counts: Mutex::new(HashMap::new()),
            online: Mutex::new(Vec::new()),
        }
    }

    /// Replace the online-user roster (presence push event).
    pub fn set_online_users(&self, users: Vec<String>) {
        *self.online.lock().unwrap() = users;
    }

    /// Currently online users, as last reported by the server.
    pub fn online_users(&self) -> Vec<String> {
        self.online.lock().unwrap().clone()
    }

    /// Whether `email` is in the online roster.
    pub fn is_online(&self, email: &str) -> bool {
        self.online.lock().unwrap().iter().any(|u| u == email)
    }

    /// A message arrived for `chat_id` (push event).
    pub fn record_incoming(&self, chat_id: &str) {
        let mut counts = self.counts.lock().unwrap();
        *counts.entry(chat_id.to_string()).or_insert(0) += 1;
    }

    /// `chat_id` was read (push event or local open).
    pub fn record_read(&self, chat_id: &str) {
        self.counts.lock().unwrap().remove(chat_id);
    }

    /// Pull authoritative counts from the server. Server values win for the
    /// conversations they mention; locally tracked conversations the server
    /// omits are kept. A fetch failure keeps the local counts.
    pub async fn refresh(&self) {
        match self.chat_api.unread_counts(&self.user_email).await {
            Ok(server) => {
                let mut counts = self.counts.lock().unwrap();
                for (chat_id, count) in server {
                    if count == 0 {
                        counts.remove(&chat_id);
                    } else {
                        counts.insert(chat_id, count);
                    }
                }
            }
            Err(e) => warn!(error = %e, "unread refresh failed, keeping local counts"),
        }
    }

    /// Unread count for one conversation.
    pub fn unread_for_chat(&self, chat_id: &str) -> u32 {
        let tracked = self
            .counts
            .lock()
            .unwrap()
            .get(chat_id)
            .copied()
            .unwrap_or(0);
        let stored = self.store.unread_for_chat(chat_id) as u32;
        tracked.max(stored)
    }

    /// Global unread count across all conversations.
    pub fn total_unread(&self) -> u32 {
        let counts = self.counts.lock().unwrap().clone();

        let mut chats: HashSet<String> = counts.keys().cloned().collect();
        for record in self.store.snapshot() {
            if !record.read
                && let Some(chat_id) = record.chat_id()
            {
                chats.insert(chat_id.to_string());
            }
        }

        chats
            .iter()
            .map(|chat_id| {
                let tracked = counts.get(chat_id).copied().unwrap_or(0);
                tracked.max(self.store.unread_for_chat(chat_id) as u32)
            })
            .sum()
    }
}
