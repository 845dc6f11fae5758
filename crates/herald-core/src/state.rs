//! Durable client-side state.
//!
//! The notification subsystem persists two small pieces of state across
//! restarts: the dedup ledger of already-surfaced alert ids, and the
//! user-toggleable sound flag. Both live behind the [`StateStore`] trait so
//! the pruning and persistence policies stay testable and the embedding host
//! can swap the backing medium.
//!
//! [`FileStateStore`] keeps everything in a single JSON object file
//! (`~/.herald/state.json` by default). Writes go through a temp file and a
//! rename so a crash mid-write never leaves a truncated file behind. A
//! malformed file is logged and treated as empty rather than failing the
//! feed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{HeraldError, Result};
use crate::logging::default_state_dir;

/// File name of the default state file under the HERALD state directory.
const STATE_FILE: &str = "state.json";

/// Durable string key-value storage.
///
/// Values are opaque strings; callers serialize their own payloads (the
/// dedup ledger stores a JSON array, the sound flag a JSON bool).
pub trait StateStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`.
    fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed state store holding one JSON object.
pub struct FileStateStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStateStore {
    /// Open (or create) the store at the default location.
    pub fn open_default() -> Result<Self> {
        let dir = default_state_dir()?;
        std::fs::create_dir_all(&dir).map_err(|e| HeraldError::DirectoryCreation {
            path: dir.clone(),
            source: e,
        })?;
        Self::open(dir.join(STATE_FILE))
    }

    /// Open (or create) a store at a specific path.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = Self::load(&path);
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn load(path: &Path) -> HashMap<String, String> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read state file, starting empty");
                return HashMap::new();
            }
        };

        match serde_json::from_str::<HashMap<String, String>>(&raw) {
            Ok(entries) => {
                debug!(path = %path.display(), keys = entries.len(), "loaded state file");
                entries
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed state file, starting empty");
                HashMap::new()
            }
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_string(entries)
            .map_err(|e| HeraldError::json_parse("serializing state", e))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| HeraldError::io("writing state file", &tmp, e))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| HeraldError::io("replacing state file", &self.path, e))?;

        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// In-memory state store for tests and headless embedding.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
