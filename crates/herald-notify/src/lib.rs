//! # herald-notify
//!
//! The notification core of HERALD: deadline polling, the capped
//! listener-driven notification feed, dedup across ticks and restarts,
//! alert presentation, and unread aggregation.
//!
//! This crate provides:
//! - [`NotificationService`] - the facade the embedding UI talks to
//! - [`NotificationStore`] - capped newest-first feed with listener broadcast
//! - [`ShownLedger`] - persisted dedup ledger with a 5-minute window
//! - [`DeadlineChecker`] - per-tick deadline discovery over the item sources
//! - [`AlertPresenter`] / [`AlertSink`] - toast, platform notification, and
//!   chime side effects behind a capability seam
//! - [`UnreadAggregator`] - per-conversation and global badge counters
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use herald_core::{MemoryStateStore, SystemClock};
//! use herald_notify::{
//!     NotificationService, NotifierConfig, ServiceDeps,
//!     presenter::NoopAlertSink,
//!     sources::{RestChatApi, RestTaskSource},
//! };
//! use herald_transport::EventTransport;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = NotifierConfig::default().with_user("me@example.com");
//!
//!     let service = NotificationService::new(
//!         config.clone(),
//!         ServiceDeps {
//!             transport: Arc::new(EventTransport::new(config.server_addr.clone())),
//!             source: Arc::new(RestTaskSource::new(config.api_base_url.clone())),
//!             chat_api: Arc::new(RestChatApi::new(config.api_base_url.clone())),
//!             sink: Arc::new(NoopAlertSink),
//!             state: Arc::new(MemoryStateStore::new()),
//!             clock: Arc::new(SystemClock),
//!         },
//!     );
//!
//!     service.start();
//! }
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod poller;
pub mod presenter;
pub mod record;
pub mod service;
pub mod sources;
pub mod store;
pub mod unread;

// Re-export main types for convenience
pub use config::NotifierConfig;
pub use error::{NotifyError, Result};
pub use ledger::ShownLedger;
pub use poller::DeadlineChecker;
pub use presenter::{AlertPresenter, AlertSink, NoopAlertSink, PermissionState};
pub use record::{NotificationKind, NotificationRecord, SourceRef};
pub use service::{NotificationService, ServiceDeps};
pub use store::{Listener, NotificationStore};
pub use unread::UnreadAggregator;
