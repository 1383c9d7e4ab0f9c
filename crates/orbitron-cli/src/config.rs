//! Client configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for talking to the agent backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL (e.g., "http://localhost:8000").
    #[serde(default = "ClientConfig::default_server_url")]
    pub server_url: String,

    /// Path of the chat endpoint, appended to `server_url`.
    #[serde(default = "ClientConfig::default_chat_path")]
    pub chat_path: String,

    /// Seconds between connection status probes.
    #[serde(default = "ClientConfig::default_health_interval")]
    pub health_interval_seconds: u64,

    /// TCP/TLS connect timeout in seconds.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Seconds a status probe may take before the backend counts as down.
    #[serde(default = "ClientConfig::default_probe_timeout")]
    pub probe_timeout_seconds: u64,
}

impl ClientConfig {
    fn default_server_url() -> String {
        "http://localhost:8000".to_string()
    }

    fn default_chat_path() -> String {
        "/api/chat".to_string()
    }

    const fn default_health_interval() -> u64 {
        5
    }

    const fn default_connect_timeout() -> u64 {
        10
    }

    const fn default_probe_timeout() -> u64 {
        5
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Full URL of the chat endpoint.
    #[must_use]
    pub fn chat_url(&self) -> String {
        let path = self.chat_path.trim_start_matches('/');
        format!("{}/{path}", self.base_url())
    }

    /// URL probed by the connection monitor.
    #[must_use]
    pub fn health_url(&self) -> String {
        format!("{}/", self.base_url())
    }

    /// Get the probe interval as a `Duration`. Never zero.
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_seconds.max(1))
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get the whole-request probe timeout as a `Duration`. Never zero.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds.max(1))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: Self::default_server_url(),
            chat_path: Self::default_chat_path(),
            health_interval_seconds: Self::default_health_interval(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            probe_timeout_seconds: Self::default_probe_timeout(),
        }
    }
}
