//! Configuration types for the status synchronization service

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SyncError};

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Where UI preferences (view mode, filters) are persisted
    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            reconnect: ReconnectConfig::default(),
            preferences_path: default_preferences_path(),
        }
    }
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the monitoring backend, e.g. `http://localhost:8080`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Interval between "get" refresh nudges on an open connection
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval(),
            connection_timeout_seconds: default_connection_timeout(),
        }
    }
}

impl ServerConfig {
    /// Derive the push-channel endpoint from the base URL.
    ///
    /// `http` maps to `ws`, `https` to `wss`; a base URL that is already a
    /// WebSocket URL keeps its scheme.
    pub fn push_endpoint(&self) -> Result<String> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| SyncError::Config(format!("Invalid base URL {}: {}", self.base_url, e)))?;

        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            "ws" => "ws",
            "wss" => "wss",
            other => {
                return Err(SyncError::Config(format!(
                    "Unsupported URL scheme: {}",
                    other
                )))
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::Config(format!("Base URL has no host: {}", self.base_url)))?;

        let endpoint = match url.port() {
            Some(port) => format!("{}://{}:{}/api/clients", scheme, host, port),
            None => format!("{}://{}/api/clients", scheme, host),
        };
        Ok(endpoint)
    }

    /// REST endpoint for the one-shot node roster fetch
    pub fn nodes_endpoint(&self) -> String {
        format!("{}/api/nodes", self.base_url.trim_end_matches('/'))
    }

    /// REST endpoint for a node's recent-window metric series
    pub fn recent_endpoint(&self, uuid: &str) -> String {
        format!("{}/api/recent/{}", self.base_url.trim_end_matches('/'), uuid)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Reconnection backoff policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first close-triggered retry
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Ceiling for the exponential backoff
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Retries after which the client gives up until a fresh start
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for the given zero-based attempt index:
    /// `min(initial * 2^attempt, max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(31);
        let delay = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_poll_interval() -> u64 {
    3000
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("statuswatch_prefs.json")
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.poll_interval_ms, 3000);
        assert_eq!(config.connection_timeout_seconds, 10);
    }

    #[test]
    fn reconnect_config_defaults() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30000);
        assert_eq!(config.max_attempts, 10);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let config = ReconnectConfig::default();
        let delays: Vec<u64> = (0..8)
            .map(|n| config.delay_for(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]);
    }

    #[test]
    fn backoff_handles_large_attempt_numbers() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for(63), Duration::from_millis(30000));
    }

    #[test]
    fn push_endpoint_switches_scheme() {
        let http = ServerConfig {
            base_url: "http://example.com:8080".to_string(),
            ..Default::default()
        };
        assert_eq!(http.push_endpoint().unwrap(), "ws://example.com:8080/api/clients");

        let https = ServerConfig {
            base_url: "https://example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(https.push_endpoint().unwrap(), "wss://example.com/api/clients");

        let ws = ServerConfig {
            base_url: "ws://example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(ws.push_endpoint().unwrap(), "ws://example.com/api/clients");
    }

    #[test]
    fn push_endpoint_rejects_invalid_url() {
        let bad = ServerConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad.push_endpoint(), Err(SyncError::Config(_))));
    }

    #[test]
    fn rest_endpoints_strip_trailing_slash() {
        let config = ServerConfig {
            base_url: "http://example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.nodes_endpoint(), "http://example.com/api/nodes");
        assert_eq!(config.recent_endpoint("n1"), "http://example.com/api/recent/n1");
    }

    #[test]
    fn config_parses_from_json() {
        let json = r#"{
            "server": {"base_url": "http://monitor.internal", "poll_interval_ms": 5000},
            "reconnect": {"max_attempts": 3}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.base_url, "http://monitor.internal");
        assert_eq!(config.server.poll_interval_ms, 5000);
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.initial_delay_ms, 1000);
        assert_eq!(config.preferences_path, PathBuf::from("statuswatch_prefs.json"));
    }
}
