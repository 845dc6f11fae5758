//! End-to-end chat notification tests: a loopback server pushes events
//! through the real transport into the service.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use herald_core::{MemoryStateStore, StateStore};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;

use herald_transport::{EventFrame, events};

use common::{Fixture, fixture_with};

const WAIT: Duration = Duration::from_secs(5);

struct Server {
    lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    write: tokio::net::tcp::OwnedWriteHalf,
}

impl Server {
    async fn push(&mut self, event: &str, data: Value) {
        let line = EventFrame::new(event, data).encode().unwrap();
        self.write.write_all(line.as_bytes()).await.unwrap();
        self.write.write_all(b"\n").await.unwrap();
    }

    async fn expect_join(&mut self) {
        let line = timeout(WAIT, self.lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .expect("connection closed before join");
        let frame = EventFrame::decode(&line).unwrap();
        assert_eq!(frame.event, events::JOIN_ROOM);
    }
}

/// Start the service against a loopback listener and accept its connection.
async fn started_fixture() -> (Fixture, Server) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let f = fixture_with(&addr, Arc::new(MemoryStateStore::new()));
    f.service.start();

    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let (read, write) = stream.into_split();
    let mut server = Server {
        lines: BufReader::new(read).lines(),
        write,
    };
    server.expect_join().await;

    (f, server)
}

fn message_payload(chat_id: &str, message_id: &str, sender: &str, content: &str) -> Value {
    json!({
        "message": {
            "id": message_id,
            "sender": sender,
            "content": content,
            "timestamp": Utc::now().to_rfc3339(),
        },
        "sender_name": sender,
        "chat_id": chat_id,
    })
}

/// Poll until `check` passes or the wait budget runs out.
async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn test_pushed_message_lands_in_feed() {
    let (f, mut server) = started_fixture().await;

    server
        .push(
            events::NEW_MESSAGE,
            message_payload("room-7", "m1", "bob@example.com", "lunch?"),
        )
        .await;

    eventually(|| f.service.notifications().len() == 1).await;

    let feed = f.service.notifications();
    assert_eq!(feed[0].id, "message_m1");
    assert_eq!(feed[0].title, "New message from bob@example.com");
    assert_eq!(f.sink.toasts.load(Ordering::SeqCst), 1);
    assert_eq!(f.sink.tones.load(Ordering::SeqCst), 1);

    f.service.stop();
}

#[tokio::test]
async fn test_active_chat_suppression_end_to_end() {
    let (f, mut server) = started_fixture().await;

    f.service.set_current_chat("room-42");
    server
        .push(
            events::NEW_MESSAGE,
            message_payload("room-42", "m1", "bob@example.com", "hi"),
        )
        .await;
    // The event for a different room still alerts.
    server
        .push(
            events::NEW_MESSAGE,
            message_payload("room-7", "m2", "bob@example.com", "over here"),
        )
        .await;

    eventually(|| f.service.notifications().len() == 1).await;
    let feed = f.service.notifications();
    assert_eq!(feed[0].chat_id(), Some("room-7"));

    // Clearing the active chat re-enables alerts for room-42.
    f.service.clear_current_chat();
    server
        .push(
            events::NEW_MESSAGE,
            message_payload("room-42", "m3", "ann@example.com", "now you see me"),
        )
        .await;
    eventually(|| f.service.notifications().len() == 2).await;

    f.service.stop();
}

#[tokio::test]
async fn test_own_messages_do_not_alert() {
    let (f, mut server) = started_fixture().await;

    server
        .push(
            events::NEW_MESSAGE,
            message_payload("room-1", "m1", "me@example.com", "talking to myself"),
        )
        .await;
    server
        .push(
            events::NEW_MESSAGE,
            message_payload("room-1", "m2", "bob@example.com", "hello"),
        )
        .await;

    // Once bob's later message is visible, mine must not be.
    eventually(|| !f.service.notifications().is_empty()).await;
    let feed = f.service.notifications();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, "message_m2");

    f.service.stop();
}

#[tokio::test]
async fn test_unread_counters_follow_read_events() {
    let (f, mut server) = started_fixture().await;

    server
        .push(events::CHAT_NEW_MESSAGE, json!({"chat_id": "room-1"}))
        .await;
    server
        .push(events::CHAT_NEW_MESSAGE, json!({"chat_id": "room-1"}))
        .await;
    server
        .push(events::CHAT_NEW_MESSAGE, json!({"chat_id": "room-2"}))
        .await;

    eventually(|| f.service.total_unread() == 3).await;
    assert_eq!(f.service.unread_for_chat("room-1"), 2);

    server
        .push(events::CHAT_READ, json!({"chat_id": "room-1"}))
        .await;
    eventually(|| f.service.unread_for_chat("room-1") == 0).await;
    assert_eq!(f.service.total_unread(), 1);

    f.service.stop();
}

#[tokio::test]
async fn test_open_chat_clears_and_reports_to_server() {
    let (f, mut server) = started_fixture().await;

    server
        .push(
            events::NEW_MESSAGE,
            message_payload("room-9", "m1", "bob@example.com", "ping"),
        )
        .await;
    eventually(|| f.service.unread_count_for_user("bob@example.com") == 1).await;

    f.service.open_chat("room-9").await;

    assert_eq!(f.service.unread_for_chat("room-9"), 0);
    assert_eq!(f.service.unread_count(), 0);
    assert_eq!(f.chat_api.reads.lock().unwrap().as_slice(), ["room-9"]);

    f.service.stop();
}

#[tokio::test]
async fn test_typing_events_pass_through_without_records() {
    let (f, mut server) = started_fixture().await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Value>();
    f.service.on_user_typing(Arc::new(move |data| {
        let _ = tx.send(data);
    }));

    server
        .push(events::USER_TYPING, json!({"chat_id": "room-1", "user": "bob"}))
        .await;

    let payload = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(payload["user"], "bob");
    assert!(f.service.notifications().is_empty());

    f.service.stop();
}

#[tokio::test]
async fn test_presence_roster_updates_from_push() {
    let (f, mut server) = started_fixture().await;

    server
        .push(
            events::ONLINE_USERS,
            json!({"users": ["ann@example.com", "bob@example.com"]}),
        )
        .await;
    eventually(|| f.service.is_online("ann@example.com")).await;

    // Bare-array payloads are accepted too, and replace the roster.
    server
        .push(events::ONLINE_USERS, json!(["bob@example.com"]))
        .await;
    eventually(|| !f.service.is_online("ann@example.com")).await;
    assert_eq!(f.service.online_users(), ["bob@example.com"]);

    f.service.stop();
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let (f, _server) = started_fixture().await;

    assert!(f.service.is_running());
    f.service.start();
    assert!(f.service.is_running());

    f.service.stop();
    assert!(!f.service.is_running());
    f.service.stop();
    assert!(!f.service.is_running());
}

#[tokio::test]
async fn test_sound_toggle_is_persisted_in_state() {
    let (f, _server) = started_fixture().await;

    assert!(f.service.sound_enabled());
    assert!(!f.service.toggle_sound());
    assert_eq!(f.state.get("sound_enabled").as_deref(), Some("false"));
    assert!(f.service.toggle_sound());
    assert_eq!(f.state.get("sound_enabled").as_deref(), Some("true"));

    f.service.stop();
}

#[tokio::test]
async fn test_record_change_produces_feed_entry() {
    let f = fixture_with("127.0.0.1:1", Arc::new(MemoryStateStore::new()));

    let record = f.service.record_change("created", "project", "Roadmap", "");
    assert_eq!(record.message, "me@example.com created project: Roadmap");

    let feed = f.service.notifications();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, record.id);
    assert_eq!(f.sink.toasts.load(Ordering::SeqCst), 1);
}
