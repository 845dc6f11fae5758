//! In-memory notification store with listener broadcast.
//!
//! The store holds the newest-first, capped feed and notifies every
//! registered listener with a full snapshot on each mutation. Listeners are
//! invoked outside the internal lock so they may re-enter the store, but the
//! snapshot they receive is always fully mutated, never partial.
//!
//! Adding a record whose id already exists is a no-op: read state is
//! monotone, and producers that regenerate the same deterministic id must
//! not duplicate or reset the existing entry.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::record::{NotificationKind, NotificationRecord};

/// Default maximum number of records kept in the feed.
pub const DEFAULT_CAPACITY: usize = 50;

/// Callback receiving the full feed snapshot after every mutation.
pub type Listener = Arc<dyn Fn(&[NotificationRecord]) + Send + Sync>;

struct Inner {
    records: Vec<NotificationRecord>,
    listeners: Vec<Listener>,
}

/// Capped, newest-first notification feed.
pub struct NotificationStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    /// Create a store with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a store keeping at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                records: Vec::new(),
                listeners: Vec::new(),
            }),
        }
    }

    /// Prepend a record and evict beyond the capacity.
    ///
    /// Returns false (and changes nothing) when a record with the same id is
    /// already present.
    pub fn add(&self, record: NotificationRecord) -> bool {
        let (snapshot, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.records.iter().any(|r| r.id == record.id) {
                debug!(id = %record.id, "ignoring duplicate record id");
                return false;
            }
            inner.records.insert(0, record);
            inner.records.truncate(self.capacity);
            (inner.records.clone(), inner.listeners.clone())
        };
        broadcast(&snapshot, &listeners);
        true
    }

    /// Fold a rapid repeat message from `sender` into its existing unread
    /// record instead of adding a new one.
    ///
    /// Returns true when an unread chat record from `sender` newer than
    /// `now - window` was updated (body replaced with the latest preview plus
    /// an "(and other messages)" marker, timestamp bumped).
    pub fn coalesce_chat(
        &self,
        sender: &str,
        preview: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> bool {
        let cutoff = now - window;
        let (snapshot, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            let Some(existing) = inner.records.iter_mut().find(|r| {
                r.kind == NotificationKind::ChatMessage
                    && !r.read
                    && r.timestamp > cutoff
                    && r.chat_sender() == Some(sender)
            }) else {
                return false;
            };
            existing.message = format!("{preview} (and other messages)");
            existing.timestamp = now;
            (inner.records.clone(), inner.listeners.clone())
        };
        broadcast(&snapshot, &listeners);
        true
    }

    /// Mark one record read. Returns whether the id was found.
    pub fn mark_read(&self, id: &str) -> bool {
        let (snapshot, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            let Some(record) = inner.records.iter_mut().find(|r| r.id == id) else {
                return false;
            };
            record.read = true;
            (inner.records.clone(), inner.listeners.clone())
        };
        broadcast(&snapshot, &listeners);
        true
    }

    /// Mark every record read.
    pub fn mark_all_read(&self) {
        let (snapshot, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            for record in inner.records.iter_mut() {
                record.read = true;
            }
            (inner.records.clone(), inner.listeners.clone())
        };
        broadcast(&snapshot, &listeners);
    }

    /// Mark every chat record of one conversation read. Returns the number
    /// of records transitioned.
    pub fn mark_chat_read(&self, chat_id: &str) -> usize {
        let (count, snapshot, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            let mut count = 0;
            for record in inner.records.iter_mut() {
                if !record.read && record.chat_id() == Some(chat_id) {
                    record.read = true;
                    count += 1;
                }
            }
            (count, inner.records.clone(), inner.listeners.clone())
        };
        if count > 0 {
            broadcast(&snapshot, &listeners);
        }
        count
    }

    /// Empty the feed.
    pub fn clear_all(&self) {
        let (snapshot, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            inner.records.clear();
            (inner.records.clone(), inner.listeners.clone())
        };
        broadcast(&snapshot, &listeners);
    }

    /// Register a listener. Registration is a set: subscribing the same
    /// callback twice has no additional effect.
    pub fn subscribe(&self, listener: Listener) {
        let mut inner = self.inner.lock().unwrap();
        if inner.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return;
        }
        inner.listeners.push(listener);
    }

    /// Remove a previously registered listener.
    pub fn unsubscribe(&self, listener: &Listener) {
        let mut inner = self.inner.lock().unwrap();
        inner.listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Full snapshot of the feed, newest first.
    pub fn snapshot(&self) -> Vec<NotificationRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    /// Whether a record with this id is present.
    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().unwrap().records.iter().any(|r| r.id == id)
    }

    /// Number of records in the feed.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// True when the feed is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of unread records.
    pub fn unread_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| !r.read)
            .count()
    }

    /// Count of unread chat records from one sender.
    pub fn unread_from_sender(&self, sender: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| !r.read && r.chat_sender() == Some(sender))
            .count()
    }

    /// Count of unread chat records in one conversation.
    pub fn unread_for_chat(&self, chat_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| !r.read && r.chat_id() == Some(chat_id))
            .count()
    }
}

fn broadcast(snapshot: &[NotificationRecord], listeners: &[Listener]) {
    for listener in listeners {
        listener(snapshot);
    }
}
