//! Realtime connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Realtime (WebSocket) connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Base endpoint of the marketplace backend (`http(s)://` or `ws(s)://`).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Path segment reserved for realtime traffic.
    #[serde(default = "default_path")]
    pub path: String,
    /// Attach credentials (cookie, bearer token, origin) to the handshake.
    #[serde(default = "default_true")]
    pub with_credentials: bool,
    /// Bearer token sent as `Authorization` when credentials are enabled.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Session cookie sent as `Cookie` when credentials are enabled.
    #[serde(default)]
    pub cookie: Option<String>,
    /// Origin header for cross-origin handshakes.
    #[serde(default)]
    pub origin: Option<String>,
    /// Handshake timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Seconds between health checks.
    #[serde(default = "default_health_interval")]
    pub health_check_interval_seconds: u64,
    /// Reconnect backoff settings.
    #[serde(default)]
    pub backoff: ReconnectBackoffConfig,
}

/// Backoff applied between failed reconnect attempts.
///
/// Disabled by default: the monitor then checks at a fixed cadence forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectBackoffConfig {
    /// Double the check interval after each failed reconnect.
    #[serde(default)]
    pub enabled: bool,
    /// Upper bound for the backed-off interval in seconds.
    #[serde(default = "default_max_backoff")]
    pub max_interval_seconds: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            path: default_path(),
            with_credentials: true,
            auth_token: None,
            cookie: None,
            origin: None,
            connect_timeout_seconds: default_connect_timeout(),
            health_check_interval_seconds: default_health_interval(),
            backoff: ReconnectBackoffConfig::default(),
        }
    }
}

impl Default for ReconnectBackoffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_interval_seconds: default_max_backoff(),
        }
    }
}

impl RealtimeConfig {
    /// Interval between health checks.
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_seconds)
    }

    /// Handshake timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Validate the realtime section.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.endpoint.trim().is_empty() {
            return Err(AppError::configuration("realtime.endpoint must not be empty"));
        }
        if !self.path.starts_with('/') {
            return Err(AppError::configuration(format!(
                "realtime.path must start with '/', got '{}'",
                self.path
            )));
        }
        if self.health_check_interval_seconds == 0 {
            return Err(AppError::configuration(
                "realtime.health_check_interval_seconds must be positive",
            ));
        }
        if self.connect_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "realtime.connect_timeout_seconds must be positive",
            ));
        }
        if self.backoff.enabled
            && self.backoff.max_interval_seconds < self.health_check_interval_seconds
        {
            return Err(AppError::configuration(
                "realtime.backoff.max_interval_seconds must not be below the health check interval",
            ));
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "http://localhost:4000".to_string()
}

fn default_path() -> String {
    "/realtime".to_string()
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_health_interval() -> u64 {
    30
}

fn default_max_backoff() -> u64 {
    300
}
