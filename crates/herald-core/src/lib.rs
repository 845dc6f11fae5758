//! # herald-core
//!
//! Core errors, logging, clock, and durable state for the HERALD
//! notification subsystem.
//!
//! This crate provides:
//! - [`HeraldError`] - Error types shared across the HERALD crates
//! - [`logging`] - Tracing setup and log management utilities
//! - [`clock`] - Injectable time source ([`Clock`], [`SystemClock`], [`ManualClock`])
//! - [`state`] - Durable key-value state ([`StateStore`] with file and memory backends)
//!
//! ## Example
//!
//! ```no_run
//! use herald_core::{logging, state::FileStateStore};
//!
//! fn main() -> herald_core::Result<()> {
//!     // Initialize logging
//!     let _guard = logging::init_logging(None, false)?;
//!
//!     // Open the durable client state
//!     let store = FileStateStore::open_default()?;
//!     let _ = store;
//!
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod error;
pub mod logging;
pub mod state;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{HeraldError, Result};
pub use logging::{LogGuard, init_logging};
pub use state::{FileStateStore, MemoryStateStore, StateStore};
