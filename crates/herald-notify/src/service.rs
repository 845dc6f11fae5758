//! The notification service facade.
//!
//! [`NotificationService`] wires the poller, store, ledger, presenter, and
//! unread aggregator to a transport and exposes the operation surface the UI
//! consumes. It is an explicitly constructed object: every dependency
//! (transport, item sources, chat API, alert sink, state store, clock) is
//! injected, and the embedding host owns the lifecycle. There is no module
//! singleton.
//!
//! Polling and push remain two independent producers feeding one store; they
//! coordinate only through deterministic record ids, so racing deliveries of
//! the same underlying event stay idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use herald_core::{Clock, StateStore};
use herald_transport::{EventHandler, EventTransport, events};

use crate::config::NotifierConfig;
use crate::ledger::ShownLedger;
use crate::poller::DeadlineChecker;
use crate::presenter::{AlertPresenter, AlertSink, NewMessagePayload};
use crate::record::NotificationRecord;
use crate::sources::{ChatApi, TaskSource};
use crate::store::{Listener, NotificationStore};
use crate::unread::UnreadAggregator;

/// Everything the service needs injected.
pub struct ServiceDeps {
    pub transport: Arc<EventTransport>,
    pub source: Arc<dyn TaskSource>,
    pub chat_api: Arc<dyn ChatApi>,
    pub sink: Arc<dyn AlertSink>,
    pub state: Arc<dyn StateStore>,
    pub clock: Arc<dyn Clock>,
}

/// Client-side notification and presence core.
pub struct NotificationService {
    config: NotifierConfig,
    transport: Arc<EventTransport>,
    chat_api: Arc<dyn ChatApi>,
    store: Arc<NotificationStore>,
    presenter: Arc<AlertPresenter>,
    unread: Arc<UnreadAggregator>,
    checker: Arc<DeadlineChecker>,
    running: Arc<AtomicBool>,
    started: AtomicBool,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    typing_listener: Arc<Mutex<Option<EventHandler>>>,
}

impl NotificationService {
    /// Build the service from its configuration and injected dependencies.
    pub fn new(config: NotifierConfig, deps: ServiceDeps) -> Self {
        let store = Arc::new(NotificationStore::with_capacity(config.max_notifications));

        let ledger = Arc::new(
            ShownLedger::new(deps.state.clone(), deps.clock.clone())
                .with_window(config.dedup_window()),
        );

        let presenter = Arc::new(AlertPresenter::new(
            deps.sink,
            deps.state,
            store.clone(),
            deps.clock.clone(),
            config.user_email.clone(),
            config.coalesce_window(),
        ));

        // Initially true so manual checks work before start().
        let running = Arc::new(AtomicBool::new(true));

        let checker = Arc::new(DeadlineChecker::new(
            deps.source,
            store.clone(),
            ledger,
            presenter.clone(),
            deps.clock,
            config.lookahead(),
            config.user_email.clone(),
            running.clone(),
        ));

        let unread = Arc::new(UnreadAggregator::new(
            store.clone(),
            deps.chat_api.clone(),
            config.user_email.clone(),
        ));

        Self {
            config,
            transport: deps.transport,
            chat_api: deps.chat_api,
            store,
            presenter,
            unread,
            checker,
            running,
            started: AtomicBool::new(false),
            poll_task: Mutex::new(None),
            typing_listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Connect the transport, register push handlers, and launch the poller.
    /// Idempotent: a second call while running is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        // Handlers first, so nothing delivered right after the join is lost.
        self.register_push_handlers();
        self.transport.connect();

        // One immediate check, then the fixed interval. Each tick runs as
        // its own task: a hung fetch never blocks the next tick.
        let checker = self.checker.clone();
        let interval = self.config.poll_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let checker = checker.clone();
                tokio::spawn(async move {
                    checker.check_deadlines().await;
                });
            }
        });
        *self.poll_task.lock().unwrap() = Some(handle);

        info!("notification service started");
    }

    /// Cancel the poller, detach push handlers, and close the transport.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.poll_task.lock().unwrap().take() {
            handle.abort();
        }
        self.transport.disconnect();

        info!("notification service stopped");
    }

    fn register_push_handlers(&self) {
        let presenter = self.presenter.clone();
        self.transport.on(
            events::NEW_MESSAGE,
            Arc::new(move |data| match serde_json::from_value::<NewMessagePayload>(data) {
                Ok(payload) => presenter.handle_new_message(payload),
                Err(e) => warn!(error = %e, "ignoring malformed new_message payload"),
            }),
        );

        let unread = self.unread.clone();
        self.transport.on(
            events::CHAT_NEW_MESSAGE,
            Arc::new(move |data| {
                if let Some(chat_id) = data.get("chat_id").and_then(Value::as_str) {
                    unread.record_incoming(chat_id);
                }
            }),
        );

        let unread = self.unread.clone();
        self.transport.on(
            events::CHAT_READ,
            Arc::new(move |data| {
                if let Some(chat_id) = data.get("chat_id").and_then(Value::as_str) {
                    unread.record_read(chat_id);
                }
            }),
        );

        let unread = self.unread.clone();
        self.transport.on(
            events::ONLINE_USERS,
            Arc::new(move |data| {
                // Roster arrives either bare or wrapped in {"users": [...]}.
                let roster = data
                    .get("users")
                    .cloned()
                    .unwrap_or(data);
                match serde_json::from_value::<Vec<String>>(roster) {
                    Ok(users) => unread.set_online_users(users),
                    Err(e) => warn!(error = %e, "ignoring malformed online_users payload"),
                }
            }),
        );

        let typing = self.typing_listener.clone();
        self.transport.on(
            events::USER_TYPING,
            Arc::new(move |data| {
                let listener = typing.lock().unwrap().clone();
                if let Some(listener) = listener {
                    listener(data);
                }
            }),
        );
    }

    // =========================================================================
    // Feed access
    // =========================================================================

    /// Current feed snapshot, newest first.
    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.store.snapshot()
    }

    /// Register a feed listener (set semantics).
    pub fn add_listener(&self, listener: Listener) {
        self.store.subscribe(listener);
    }

    /// Remove a feed listener.
    pub fn remove_listener(&self, listener: &Listener) {
        self.store.unsubscribe(listener);
    }

    /// Mark one record read.
    pub fn mark_as_read(&self, id: &str) -> bool {
        self.store.mark_read(id)
    }

    /// Mark every record read.
    pub fn mark_all_as_read(&self) {
        self.store.mark_all_read();
    }

    /// Empty the feed.
    pub fn clear_all(&self) {
        self.store.clear_all();
    }

    /// Count of unread records in the feed.
    pub fn unread_count(&self) -> usize {
        self.store.unread_count()
    }

    /// Count of unread chat records from one sender.
    pub fn unread_count_for_user(&self, sender: &str) -> usize {
        self.store.unread_from_sender(sender)
    }

    // =========================================================================
    // Deadlines
    // =========================================================================

    /// Manually trigger one deadline check (also used by the interval loop).
    pub async fn check_deadlines(&self) {
        self.checker.check_deadlines().await;
    }

    // =========================================================================
    // Chat
    // =========================================================================

    /// The user opened a conversation: mark its records read locally, clear
    /// its badge, and tell the server.
    pub async fn open_chat(&self, chat_id: &str) {
        self.store.mark_chat_read(chat_id);
        self.unread.record_read(chat_id);
        if let Err(e) = self
            .chat_api
            .mark_chat_read(chat_id, &self.config.user_email)
            .await
        {
            warn!(chat_id, error = %e, "failed to mark chat read on server");
        }
    }

    /// Mark `chat_id` as currently open; its messages stop alerting.
    pub fn set_current_chat(&self, chat_id: impl Into<String>) {
        self.presenter.set_current_chat(chat_id);
    }

    /// No conversation is open anymore.
    pub fn clear_current_chat(&self) {
        self.presenter.clear_current_chat();
    }

    /// Unread count for one conversation.
    pub fn unread_for_chat(&self, chat_id: &str) -> u32 {
        self.unread.unread_for_chat(chat_id)
    }

    /// Global unread count across conversations.
    pub fn total_unread(&self) -> u32 {
        self.unread.total_unread()
    }

    /// Pull authoritative unread counts from the server.
    pub async fn refresh_unread(&self) {
        self.unread.refresh().await;
    }

    /// Currently online users, as last reported by the server.
    pub fn online_users(&self) -> Vec<String> {
        self.unread.online_users()
    }

    /// Whether `email` is currently online.
    pub fn is_online(&self, email: &str) -> bool {
        self.unread.is_online(email)
    }

    /// Register a callback for `user_typing` push events. The payload is
    /// passed through untouched; no record is produced.
    pub fn on_user_typing(&self, listener: EventHandler) {
        *self.typing_listener.lock().unwrap() = Some(listener);
    }

    // =========================================================================
    // Alerts & sound
    // =========================================================================

    /// Flip and persist the sound flag; returns the new value.
    pub fn toggle_sound(&self) -> bool {
        self.presenter.toggle_sound()
    }

    /// Whether the chime is currently enabled.
    pub fn sound_enabled(&self) -> bool {
        self.presenter.sound_enabled()
    }

    /// Ask for platform notification permission when undecided; returns
    /// whether notifications are permitted.
    pub fn request_permission(&self) -> bool {
        self.presenter.request_permission()
    }

    /// Produce a change-event record for a local user action.
    pub fn record_change(
        &self,
        action: &str,
        item_kind: &str,
        item_name: &str,
        details: &str,
    ) -> NotificationRecord {
        self.presenter
            .record_change(self.config.actor_name(), action, item_kind, item_name, details)
    }

    /// Whether [`start`] has been called without a matching [`stop`].
    ///
    /// [`start`]: NotificationService::start
    /// [`stop`]: NotificationService::stop
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// The service configuration.
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }
}
