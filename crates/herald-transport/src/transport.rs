//! Reconnecting event transport.
//!
//! One live connection to the collaboration server per client instance.
//! Independent parts of the UI register handlers for named events without
//! clobbering each other; the transport survives network blips by
//! reconnecting with a bounded number of attempts and a fixed delay, and
//! rejoins the default broadcast scope after every successful (re)connect.
//!
//! Handlers are looked up in the live registry at dispatch time, so a
//! reconnect never drops subscriptions registered before the blip.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use herald_transport::{EventTransport, frame::events};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = EventTransport::new("127.0.0.1:5000");
//!
//!     transport.on(
//!         events::NEW_MESSAGE,
//!         Arc::new(|data| {
//!             println!("message payload: {data}");
//!         }),
//!     );
//!
//!     transport.connect();
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::frame::{EventFrame, events};

/// Default number of reconnection attempts before giving up.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;

/// Default fixed delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Default broadcast scope joined after every (re)connect.
pub const DEFAULT_ROOM: &str = "general";

/// Callback invoked with the payload of a named event.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Configuration for the event transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Reconnection attempts after a drop before giving up.
    pub reconnect_attempts: u32,
    /// Fixed delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Broadcast scope joined on every (re)connect.
    pub default_room: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            default_room: DEFAULT_ROOM.to_string(),
        }
    }
}

impl TransportConfig {
    /// Set the number of reconnection attempts.
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Set the delay between reconnection attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the default broadcast scope.
    pub fn with_default_room(mut self, room: impl Into<String>) -> Self {
        self.default_room = room.into();
        self
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no task trying to establish one.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Live connection.
    Connected,
    /// Connection lost, retrying.
    Reconnecting,
}

/// Reconnecting bidirectional event channel.
pub struct EventTransport {
    addr: String,
    config: TransportConfig,
    inner: Arc<Inner>,
}

struct Inner {
    handlers: Mutex<HashMap<String, EventHandler>>,
    state: Mutex<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    // Bumped by disconnect(); connection tasks exit when their epoch is stale.
    shutdown: watch::Sender<u64>,
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    fn set_outbound(&self, tx: mpsc::UnboundedSender<String>) {
        *self.outbound.lock().unwrap() = Some(tx);
    }

    fn clear_outbound(&self) {
        *self.outbound.lock().unwrap() = None;
    }

    fn dispatch(&self, frame: EventFrame) {
        let handler = self.handlers.lock().unwrap().get(&frame.event).cloned();
        match handler {
            Some(handler) => handler(frame.data),
            None => debug!(event = %frame.event, "no handler registered for event"),
        }
    }
}

impl EventTransport {
    /// Create a transport for the given server address with default config.
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_config(addr, TransportConfig::default())
    }

    /// Create a transport with custom configuration.
    pub fn with_config(addr: impl Into<String>, config: TransportConfig) -> Self {
        let (shutdown, _) = watch::channel(0u64);
        Self {
            addr: addr.into(),
            config,
            inner: Arc::new(Inner {
                handlers: Mutex::new(HashMap::new()),
                state: Mutex::new(ConnectionState::Disconnected),
                outbound: Mutex::new(None),
                shutdown,
            }),
        }
    }

    /// Start the connection task. Idempotent: a no-op when a connection is
    /// live or already being established.
    ///
    /// Connection errors are logged, never returned; the task retries with a
    /// fixed delay up to the configured attempt budget, then parks the
    /// transport in [`ConnectionState::Disconnected`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if *state != ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Connecting;
        }

        let inner = Arc::clone(&self.inner);
        let addr = self.addr.clone();
        let config = self.config.clone();
        tokio::spawn(run_connection(inner, addr, config));
    }

    /// Register `handler` for `event`, replacing any prior handler under the
    /// same name. The transport keeps at most one handler per event name;
    /// callers needing fan-out multiplex themselves.
    pub fn on(&self, event: impl Into<String>, handler: EventHandler) {
        self.inner.handlers.lock().unwrap().insert(event.into(), handler);
    }

    /// Detach and forget the handler for `event`.
    pub fn off(&self, event: &str) {
        self.inner.handlers.lock().unwrap().remove(event);
    }

    /// Fire-and-forget send. Silently dropped when not connected; no queuing.
    pub fn emit(&self, event: &str, data: Value) {
        if !self.is_connected() {
            debug!(event, "emit dropped, transport not connected");
            return;
        }

        let frame = EventFrame::new(event, data);
        let line = match frame.encode() {
            Ok(line) => line,
            Err(e) => {
                warn!(event, error = %e, "failed to encode outgoing frame");
                return;
            }
        };

        let outbound = self.inner.outbound.lock().unwrap();
        match outbound.as_ref() {
            Some(tx) => {
                if tx.send(line).is_err() {
                    debug!(event, "emit dropped, connection closing");
                }
            }
            None => debug!(event, "emit dropped, no live connection"),
        }
    }

    /// Detach all handlers and close the connection. A later [`connect`]
    /// starts fresh.
    ///
    /// [`connect`]: EventTransport::connect
    pub fn disconnect(&self) {
        self.inner.handlers.lock().unwrap().clear();
        self.inner.clear_outbound();
        self.inner.set_state(ConnectionState::Disconnected);
        self.inner.shutdown.send_modify(|epoch| *epoch += 1);
        info!("transport disconnected");
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// True when a connection is live.
    pub fn is_connected(&self) -> bool {
        self.inner.state() == ConnectionState::Connected
    }

    /// Number of registered event handlers.
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().unwrap().len()
    }

    /// Server address this transport targets.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

/// Connection driver: connect, serve until drop, retry within the attempt
/// budget, exit on shutdown.
async fn run_connection(inner: Arc<Inner>, addr: String, config: TransportConfig) {
    let mut shutdown = inner.shutdown.subscribe();
    let epoch = *shutdown.borrow();
    let mut attempts_left = config.reconnect_attempts;

    loop {
        if *shutdown.borrow() != epoch {
            return;
        }

        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                attempts_left = config.reconnect_attempts;
                inner.set_state(ConnectionState::Connected);
                info!(addr = %addr, "transport connected");

                serve_connection(&inner, stream, &config, &mut shutdown, epoch).await;

                if *shutdown.borrow() != epoch {
                    // Deliberate disconnect; state already set by disconnect().
                    return;
                }

                inner.clear_outbound();
                inner.set_state(ConnectionState::Reconnecting);
                warn!(addr = %addr, "transport connection lost");
            }
            Err(e) => {
                warn!(addr = %addr, error = %e, "transport connect failed");
            }
        }

        if attempts_left == 0 {
            inner.set_state(ConnectionState::Disconnected);
            warn!(addr = %addr, "reconnect attempts exhausted, giving up");
            return;
        }
        attempts_left -= 1;

        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown.changed() => return,
        }
    }
}

/// Serve one live connection: join the default scope, pump outgoing frames,
/// dispatch incoming ones. Returns when the connection drops or shutdown is
/// signalled.
async fn serve_connection(
    inner: &Arc<Inner>,
    stream: TcpStream,
    config: &TransportConfig,
    shutdown: &mut watch::Receiver<u64>,
    epoch: u64,
) {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    inner.set_outbound(tx.clone());

    // (Re)issue the join for the default broadcast scope.
    let join = EventFrame::new(
        events::JOIN_ROOM,
        serde_json::json!({ "room": config.default_room }),
    );
    match join.encode() {
        Ok(line) => {
            let _ = tx.send(line);
        }
        Err(e) => warn!(error = %e, "failed to encode join frame"),
    }

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match EventFrame::decode(&line) {
                            Ok(frame) => inner.dispatch(frame),
                            Err(e) => warn!(error = %e, "dropping malformed frame"),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "transport read error");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() != epoch {
                    break;
                }
            }
        }
    }

    // Dropping every sender ends the writer task after it drains.
    inner.clear_outbound();
    drop(tx);
    let _ = writer.await;
}
