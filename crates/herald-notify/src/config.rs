//! Configuration for the notification service.
//!
//! Loaded from `~/.herald/config.yaml`; every field has a default so a
//! partial (or missing) file works. Window durations are stored as plain
//! seconds in the file and exposed as typed durations.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use herald_transport::TransportConfig;

use crate::error::{NotifyError, Result};

/// Notification service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Push-event server address (host:port).
    pub server_addr: String,

    /// REST API base URL for the task and chat endpoints.
    pub api_base_url: String,

    /// Identifier of the current user; keys the item and chat queries.
    pub user_email: String,

    /// Display name used when producing change events.
    pub display_name: Option<String>,

    /// Seconds between deadline poller ticks.
    pub poll_interval_secs: u64,

    /// Alert lookahead window in seconds.
    pub lookahead_secs: i64,

    /// Dedup ledger window in seconds.
    pub dedup_window_secs: i64,

    /// Same-sender chat coalescing window in seconds.
    pub coalesce_window_secs: i64,

    /// Maximum records kept in the notification feed.
    pub max_notifications: usize,

    /// Transport reconnection attempts before giving up.
    pub reconnect_attempts: u32,

    /// Fixed delay between reconnection attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:5000".to_string(),
            api_base_url: "http://127.0.0.1:5000".to_string(),
            user_email: String::new(),
            display_name: None,
            poll_interval_secs: 60,
            lookahead_secs: 300,
            dedup_window_secs: 300,
            coalesce_window_secs: 60,
            max_notifications: 50,
            reconnect_attempts: 10,
            reconnect_delay_ms: 1000,
        }
    }
}

impl NotifierConfig {
    /// Load from a YAML file. A missing file yields the defaults; an
    /// unparsable file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(NotifyError::Io(e)),
        };

        serde_yaml::from_str(&raw).map_err(|e| NotifyError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Default config file location (`~/.herald/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".herald").join("config.yaml"))
    }

    /// Set the user this instance runs for.
    pub fn with_user(mut self, email: impl Into<String>) -> Self {
        self.user_email = email.into();
        self
    }

    /// Set the push-event server address.
    pub fn with_server_addr(mut self, addr: impl Into<String>) -> Self {
        self.server_addr = addr.into();
        self
    }

    /// Set the REST API base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Poller tick interval.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    /// Deadline lookahead window.
    pub fn lookahead(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lookahead_secs)
    }

    /// Dedup ledger window.
    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_window_secs)
    }

    /// Chat coalescing window.
    pub fn coalesce_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.coalesce_window_secs)
    }

    /// Name used as the actor of change events.
    pub fn actor_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_email)
    }

    /// Derive the transport configuration.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::default()
            .with_reconnect_attempts(self.reconnect_attempts)
            .with_reconnect_delay(std::time::Duration::from_millis(self.reconnect_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NotifierConfig::default();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.lookahead_secs, 300);
        assert_eq!(config.dedup_window_secs, 300);
        assert_eq!(config.max_notifications, 50);
        assert_eq!(config.reconnect_attempts, 10);
        assert_eq!(config.actor_name(), "");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: NotifierConfig =
            serde_yaml::from_str("user_email: me@example.com\npoll_interval_secs: 30\n").unwrap();

        assert_eq!(config.user_email, "me@example.com");
        assert_eq!(config.poll_interval_secs, 30);
        // Untouched fields keep their defaults.
        assert_eq!(config.lookahead_secs, 300);
        assert_eq!(config.coalesce_window_secs, 60);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = NotifierConfig::load(Path::new("/nonexistent/herald.yaml")).unwrap();
        assert_eq!(config.poll_interval_secs, 60);
    }

    #[test]
    fn test_load_invalid_file_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "poll_interval_secs: [not, a, number]").unwrap();

        let err = NotifierConfig::load(&path).unwrap_err();
        assert!(matches!(err, NotifyError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_actor_name_prefers_display_name() {
        let mut config = NotifierConfig::default().with_user("me@example.com");
        assert_eq!(config.actor_name(), "me@example.com");

        config.display_name = Some("Mel".to_string());
        assert_eq!(config.actor_name(), "Mel");
    }

    #[test]
    fn test_transport_config_mapping() {
        let mut config = NotifierConfig::default();
        config.reconnect_attempts = 3;
        config.reconnect_delay_ms = 250;

        let transport = config.transport_config();
        assert_eq!(transport.reconnect_attempts, 3);
        assert_eq!(
            transport.reconnect_delay,
            std::time::Duration::from_millis(250)
        );
    }
}
