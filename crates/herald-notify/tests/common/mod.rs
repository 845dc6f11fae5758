//! Shared fixtures for herald-notify integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use herald_core::{ManualClock, MemoryStateStore};
use herald_notify::error::{NotifyError, Result};
use herald_notify::presenter::{AlertSink, PermissionState};
use herald_notify::record::NotificationRecord;
use herald_notify::sources::{AiTaskBatch, AiTaskItem, ChatApi, TaskItem, TaskSource};
use herald_notify::{NotificationService, NotifierConfig, ServiceDeps};
use herald_transport::{EventTransport, TransportConfig};

/// Scriptable task source: settable task/batch lists, per-source failure
/// switches.
#[derive(Default)]
pub struct FakeTaskSource {
    tasks: Mutex<Vec<TaskItem>>,
    batches: Mutex<Vec<AiTaskBatch>>,
    pub fail_tasks: AtomicBool,
    pub fail_batches: AtomicBool,
}

impl FakeTaskSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tasks(&self, tasks: Vec<TaskItem>) {
        *self.tasks.lock().unwrap() = tasks;
    }

    pub fn set_batches(&self, batches: Vec<AiTaskBatch>) {
        *self.batches.lock().unwrap() = batches;
    }
}

#[async_trait]
impl TaskSource for FakeTaskSource {
    async fn deadline_tasks(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<TaskItem>> {
        if self.fail_tasks.load(Ordering::SeqCst) {
            return Err(NotifyError::UnexpectedPayload {
                context: "simulated task fetch failure".into(),
            });
        }
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn derived_batches(&self, _user_email: &str) -> Result<Vec<AiTaskBatch>> {
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(NotifyError::UnexpectedPayload {
                context: "simulated AI task fetch failure".into(),
            });
        }
        Ok(self.batches.lock().unwrap().clone())
    }
}

/// Chat API whose unread counts are scripted in memory.
#[derive(Default)]
pub struct FakeChatApi {
    pub counts: Mutex<HashMap<String, u32>>,
    pub reads: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn unread_counts(&self, _user_email: &str) -> Result<HashMap<String, u32>> {
        Ok(self.counts.lock().unwrap().clone())
    }

    async fn mark_chat_read(&self, chat_id: &str, _user_email: &str) -> Result<()> {
        self.reads.lock().unwrap().push(chat_id.to_string());
        Ok(())
    }
}

/// Alert sink counting its invocations.
#[derive(Default)]
pub struct CountingSink {
    pub toasts: AtomicUsize,
    pub system: AtomicUsize,
    pub tones: AtomicUsize,
}

impl AlertSink for CountingSink {
    fn toast(&self, _record: &NotificationRecord) {
        self.toasts.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_system(&self, _title: &str, _body: &str) -> bool {
        self.system.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn permission(&self) -> PermissionState {
        PermissionState::Denied
    }

    fn request_permission(&self) -> PermissionState {
        PermissionState::Denied
    }

    fn play_tone(&self) {
        self.tones.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fixture bundling a service with handles to its scripted collaborators.
pub struct Fixture {
    pub service: NotificationService,
    pub source: Arc<FakeTaskSource>,
    pub chat_api: Arc<FakeChatApi>,
    pub sink: Arc<CountingSink>,
    pub state: Arc<MemoryStateStore>,
    pub clock: Arc<ManualClock>,
}

/// Build a service for `me@example.com` against scripted collaborators.
/// `server_addr` is only dialled when the test calls `start()`.
pub fn fixture_with(server_addr: &str, state: Arc<MemoryStateStore>) -> Fixture {
    let config = NotifierConfig::default()
        .with_user("me@example.com")
        .with_server_addr(server_addr);

    let source = Arc::new(FakeTaskSource::new());
    let chat_api = Arc::new(FakeChatApi::default());
    let sink = Arc::new(CountingSink::default());
    let clock = Arc::new(ManualClock::at_system_time());

    let transport = Arc::new(EventTransport::with_config(
        server_addr,
        TransportConfig::default()
            .with_reconnect_delay(std::time::Duration::from_millis(50))
            .with_reconnect_attempts(2),
    ));

    let service = NotificationService::new(
        config,
        ServiceDeps {
            transport,
            source: source.clone(),
            chat_api: chat_api.clone(),
            sink: sink.clone(),
            state: state.clone(),
            clock: clock.clone(),
        },
    );

    Fixture {
        service,
        source,
        chat_api,
        sink,
        state,
        clock,
    }
}

/// Build a fixture with fresh in-memory state and an unreachable transport.
pub fn fixture() -> Fixture {
    fixture_with("127.0.0.1:1", Arc::new(MemoryStateStore::new()))
}

/// An active task due `minutes` from `now`.
pub fn task_due_in(id: &str, title: &str, now: DateTime<Utc>, minutes: i64) -> TaskItem {
    task(id, title, Some(now + chrono::Duration::minutes(minutes)), false, false)
}

pub fn task(
    id: &str,
    title: &str,
    deadline: Option<DateTime<Utc>>,
    completed: bool,
    in_trash: bool,
) -> TaskItem {
    TaskItem {
        id: id.to_string(),
        title: title.to_string(),
        deadline,
        completed,
        in_trash,
    }
}

pub fn batch(id: &str, items: Vec<AiTaskItem>) -> AiTaskBatch {
    AiTaskBatch {
        id: id.to_string(),
        items,
    }
}

pub fn ai_item(title: &str, deadline: Option<String>) -> AiTaskItem {
    AiTaskItem {
        title: title.to_string(),
        deadline,
    }
}
