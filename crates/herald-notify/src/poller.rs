//! Deadline discovery.
//!
//! [`DeadlineChecker`] holds the per-tick logic: query both item sources,
//! filter to deadlines that just entered the lookahead window, consult the
//! dedup ledger, and hand fresh records to the store and presenter. The
//! interval loop that drives it lives in the service and spawns one
//! independent task per tick, so a hung fetch delays only its own results.
//!
//! Failure policy: a fetch error on either source is logged and treated as
//! zero items from that source for the tick; a malformed deadline string
//! skips that single item. Nothing escapes [`check_deadlines`].
//!
//! [`check_deadlines`]: DeadlineChecker::check_deadlines

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use herald_core::Clock;
use tracing::{debug, warn};

use crate::ledger::ShownLedger;
use crate::presenter::AlertPresenter;
use crate::record::NotificationRecord;
use crate::sources::TaskSource;
use crate::store::NotificationStore;

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default lookahead window in seconds (5 minutes).
pub const DEFAULT_LOOKAHEAD_SECS: i64 = 300;

/// Per-tick deadline discovery logic.
pub struct DeadlineChecker {
    source: Arc<dyn TaskSource>,
    store: Arc<NotificationStore>,
    ledger: Arc<ShownLedger>,
    presenter: Arc<AlertPresenter>,
    clock: Arc<dyn Clock>,
    lookahead: Duration,
    user_email: String,
    running: Arc<AtomicBool>,
}

impl DeadlineChecker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn TaskSource>,
        store: Arc<NotificationStore>,
        ledger: Arc<ShownLedger>,
        presenter: Arc<AlertPresenter>,
        clock: Arc<dyn Clock>,
        lookahead: Duration,
        user_email: impl Into<String>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            store,
            ledger,
            presenter,
            clock,
            lookahead,
            user_email: user_email.into(),
            running,
        }
    }

    /// Run one discovery tick. Never fails; all errors are logged and
    /// degrade to empty results.
    pub async fn check_deadlines(&self) {
        let now = self.clock.now();
        let until = now + self.lookahead;

        let tasks = match self.source.deadline_tasks(now, until).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "task fetch failed, treating as empty this tick");
                Vec::new()
            }
        };

        let batches = match self.source.derived_batches(&self.user_email).await {
            Ok(batches) => batches,
            Err(e) => {
                warn!(error = %e, "AI task fetch failed, treating as empty this tick");
                Vec::new()
            }
        };

        let mut fresh = Vec::new();

        for task in &tasks {
            if !task.is_active() {
                continue;
            }
            let Some(deadline) = task.deadline else {
                continue;
            };
            if !within_window(deadline, now, until) {
                continue;
            }
            fresh.push(NotificationRecord::deadline_task(
                &task.id, &task.title, deadline, now,
            ));
        }

        for batch in &batches {
            for (index, item) in batch.items.iter().enumerate() {
                let Some(raw) = item.deadline.as_deref() else {
                    continue;
                };
                let deadline = match DateTime::parse_from_rfc3339(raw) {
                    Ok(deadline) => deadline.with_timezone(&Utc),
                    Err(e) => {
                        warn!(
                            batch_id = %batch.id,
                            index,
                            deadline = raw,
                            error = %e,
                            "invalid deadline format, skipping item"
                        );
                        continue;
                    }
                };
                if !within_window(deadline, now, until) {
                    continue;
                }
                fresh.push(NotificationRecord::deadline_ai_task(
                    &batch.id,
                    index,
                    &item.title,
                    deadline,
                    now,
                ));
            }
        }

        for record in fresh {
            if self.ledger.has_been_shown(&record.id) {
                continue;
            }
            // A tick racing a stop() must not mutate shared state.
            if !self.running.load(Ordering::SeqCst) {
                debug!("checker stopped, discarding stale tick results");
                return;
            }
            let id = record.id.clone();
            if self.store.add(record.clone()) {
                self.presenter.present_deadline(&record);
            }
            self.ledger.mark_shown(&id);
        }
    }
}

/// Strictly-future deadline inside the lookahead window. Deadlines that
/// elapsed before being observed are never alerted (no backfill).
fn within_window(deadline: DateTime<Utc>, now: DateTime<Utc>, until: DateTime<Utc>) -> bool {
    deadline > now && deadline <= until
}
