//! Dedup ledger of already-surfaced alert ids.
//!
//! Deadline alerts must fire exactly once per crossing, across poller ticks
//! and across process restarts. The ledger records each surfaced id with its
//! shown-at time, persists the set through the durable state store, and
//! prunes entries beyond the dedup window lazily whenever it is consulted.
//! The TTL lives here and nowhere else.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use herald_core::{Clock, StateStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// State-store key holding the ledger entries.
pub const LEDGER_STATE_KEY: &str = "shown_alerts";

/// Default dedup window in seconds (5 minutes).
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 300;

/// One surfaced alert id with the moment it was shown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShownEntry {
    pub id: String,
    pub shown_at: DateTime<Utc>,
}

/// Time-windowed record of surfaced alert ids.
pub struct ShownLedger {
    state: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl ShownLedger {
    /// Create a ledger with the default 5-minute window.
    pub fn new(state: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state,
            clock,
            window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
        }
    }

    /// Override the dedup window.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// True when `id` was surfaced within the dedup window. Entries older
    /// than the window are pruned (and the pruned set persisted) as a side
    /// effect of the check.
    pub fn has_been_shown(&self, id: &str) -> bool {
        let cutoff = self.clock.now() - self.window;
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| e.shown_at > cutoff);
        if entries.len() != before {
            debug!(pruned = before - entries.len(), "expired ledger entries");
            self.persist(&entries);
        }
        entries.iter().any(|e| e.id == id)
    }

    /// Record that `id` was surfaced now.
    pub fn mark_shown(&self, id: &str) {
        let mut entries = self.load();
        entries.push(ShownEntry {
            id: id.to_string(),
            shown_at: self.clock.now(),
        });
        self.persist(&entries);
    }

    fn load(&self) -> Vec<ShownEntry> {
        let Some(raw) = self.state.get(LEDGER_STATE_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "malformed ledger state, starting empty");
                Vec::new()
            }
        }
    }

    fn persist(&self, entries: &[ShownEntry]) {
        let json = match serde_json::to_string(entries) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize ledger");
                return;
            }
        };
        if let Err(e) = self.state.put(LEDGER_STATE_KEY, &json) {
            warn!(error = %e, "failed to persist ledger");
        }
    }
}
