//! Integration tests for the event transport against a loopback TCP server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use herald_transport::{ConnectionState, EventFrame, EventTransport, TransportConfig, events};

const WAIT: Duration = Duration::from_secs(5);

/// Test-speed config: quick retries so reconnect cases finish fast.
fn fast_config() -> TransportConfig {
    TransportConfig::default().with_reconnect_delay(Duration::from_millis(50))
}

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

/// Accept one connection and return (line reader, write half).
async fn accept(
    listener: &TcpListener,
) -> (
    tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    tokio::net::tcp::OwnedWriteHalf,
) {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let (read, write) = stream.into_split();
    (BufReader::new(read).lines(), write)
}

async fn next_frame(
    lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
) -> EventFrame {
    let line = timeout(WAIT, lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .expect("connection closed before a frame arrived");
    EventFrame::decode(&line).unwrap()
}

async fn send_frame(write: &mut tokio::net::tcp::OwnedWriteHalf, event: &str, data: Value) {
    let line = EventFrame::new(event, data).encode().unwrap();
    write.write_all(line.as_bytes()).await.unwrap();
    write.write_all(b"\n").await.unwrap();
}

async fn wait_connected(transport: &EventTransport) {
    for _ in 0..100 {
        if transport.is_connected() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("transport never reached connected state");
}

#[tokio::test]
async fn test_connect_joins_default_room() {
    let (listener, addr) = listen().await;
    let transport = EventTransport::with_config(addr, fast_config());

    transport.connect();
    let (mut lines, _write) = accept(&listener).await;

    let join = next_frame(&mut lines).await;
    assert_eq!(join.event, events::JOIN_ROOM);
    assert_eq!(join.data["room"], "general");

    wait_connected(&transport).await;
    assert_eq!(transport.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_pushed_event_reaches_registered_handler() {
    let (listener, addr) = listen().await;
    let transport = EventTransport::with_config(addr, fast_config());

    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    transport.on(
        events::NEW_MESSAGE,
        Arc::new(move |data| {
            let _ = tx.send(data);
        }),
    );

    transport.connect();
    let (mut lines, mut write) = accept(&listener).await;
    next_frame(&mut lines).await; // join_room

    send_frame(&mut write, events::NEW_MESSAGE, json!({"chat_id": "room-7"})).await;

    let payload = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(payload["chat_id"], "room-7");
}

#[tokio::test]
async fn test_handler_replacement_keeps_only_latest() {
    let (listener, addr) = listen().await;
    let transport = EventTransport::with_config(addr, fast_config());

    let (first_tx, mut first_rx) = mpsc::unbounded_channel::<Value>();
    let (second_tx, mut second_rx) = mpsc::unbounded_channel::<Value>();

    transport.on(
        events::NEW_MESSAGE,
        Arc::new(move |data| {
            let _ = first_tx.send(data);
        }),
    );
    // Same event name: replaces the first handler entirely.
    transport.on(
        events::NEW_MESSAGE,
        Arc::new(move |data| {
            let _ = second_tx.send(data);
        }),
    );

    transport.connect();
    let (mut lines, mut write) = accept(&listener).await;
    next_frame(&mut lines).await;

    send_frame(&mut write, events::NEW_MESSAGE, json!({"n": 1})).await;

    let payload = timeout(WAIT, second_rx.recv()).await.unwrap().unwrap();
    assert_eq!(payload["n"], 1);
    assert!(first_rx.try_recv().is_err(), "replaced handler must not fire");
}

#[tokio::test]
async fn test_emit_reaches_server() {
    let (listener, addr) = listen().await;
    let transport = EventTransport::with_config(addr, fast_config());

    transport.connect();
    let (mut lines, _write) = accept(&listener).await;
    next_frame(&mut lines).await; // join_room
    wait_connected(&transport).await;

    transport.emit("deadline_alert", json!({"id": "task_1_99"}));

    let frame = next_frame(&mut lines).await;
    assert_eq!(frame.event, "deadline_alert");
    assert_eq!(frame.data["id"], "task_1_99");
}

#[tokio::test]
async fn test_reconnect_rejoins_and_still_dispatches() {
    let (listener, addr) = listen().await;
    let transport = EventTransport::with_config(addr, fast_config());

    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    transport.on(
        events::NEW_MESSAGE,
        Arc::new(move |data| {
            let _ = tx.send(data);
        }),
    );

    transport.connect();
    let (mut lines, write) = accept(&listener).await;
    next_frame(&mut lines).await;
    wait_connected(&transport).await;

    // Drop the server side of the connection; the client must retry.
    drop(write);
    drop(lines);

    let (mut lines, mut write) = accept(&listener).await;
    let rejoin = next_frame(&mut lines).await;
    assert_eq!(rejoin.event, events::JOIN_ROOM, "must rejoin after reconnect");

    // Handlers registered before the blip keep receiving events.
    send_frame(&mut write, events::NEW_MESSAGE, json!({"after": "reconnect"})).await;
    let payload = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(payload["after"], "reconnect");
}

#[tokio::test]
async fn test_disconnect_then_connect_starts_fresh() {
    let (listener, addr) = listen().await;
    let transport = EventTransport::with_config(addr, fast_config());

    transport.on(events::NEW_MESSAGE, Arc::new(|_| {}));
    transport.connect();
    let (mut lines, _write) = accept(&listener).await;
    next_frame(&mut lines).await;
    wait_connected(&transport).await;

    transport.disconnect();
    assert_eq!(transport.handler_count(), 0);
    assert_eq!(transport.state(), ConnectionState::Disconnected);

    // A later connect establishes a brand-new session with its own join.
    transport.connect();
    let (mut lines, _write) = accept(&listener).await;
    let join = next_frame(&mut lines).await;
    assert_eq!(join.event, events::JOIN_ROOM);
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let (listener, addr) = listen().await;
    let transport = EventTransport::with_config(addr, fast_config());

    transport.connect();
    transport.connect();
    transport.connect();

    let (mut lines, _write) = accept(&listener).await;
    next_frame(&mut lines).await;
    wait_connected(&transport).await;

    // Only one connection should ever be made: a second accept must time out.
    let second = timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(second.is_err(), "idempotent connect must not open extra connections");
}

#[tokio::test]
async fn test_gives_up_after_bounded_attempts() {
    // Grab a port with no listener behind it.
    let (listener, addr) = listen().await;
    drop(listener);

    let config = fast_config().with_reconnect_attempts(2);
    let transport = EventTransport::with_config(addr, config);
    transport.connect();

    // 1 initial try + 2 retries at 50ms spacing; give it ample room.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(transport.state(), ConnectionState::Disconnected);
}

// Malformed frames are logged and skipped without killing the connection.
#[tokio::test]
async fn test_malformed_frame_does_not_break_stream() {
    let (listener, addr) = listen().await;
    let transport = EventTransport::with_config(addr, fast_config());

    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    transport.on(
        events::CHAT_READ,
        Arc::new(move |data| {
            let _ = tx.send(data);
        }),
    );

    transport.connect();
    let (mut lines, mut write) = accept(&listener).await;
    next_frame(&mut lines).await;

    write.write_all(b"this is not a frame\n").await.unwrap();
    send_frame(&mut write, events::CHAT_READ, json!({"chat_id": "room-1"})).await;

    let payload = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(payload["chat_id"], "room-1");
}

// Regression guard: a client that races connect() against the listener must
// still deliver the join frame once accepted.
#[tokio::test]
async fn test_connect_before_accept_still_joins() {
    let (listener, addr) = listen().await;
    let transport = EventTransport::with_config(addr, fast_config());

    transport.connect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let (read, _write) = TcpStream::into_split(stream);
    let mut lines = BufReader::new(read).lines();

    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    let join = EventFrame::decode(&line).unwrap();
    assert_eq!(join.event, events::JOIN_ROOM);
}
