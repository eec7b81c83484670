//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Proxy subsystem settings (gate, shared secret, outbound timeouts).
    pub disraptor: DisraptorConfig,

    /// Inbound timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Route administration API settings.
    pub admin: AdminConfig,

    /// Route table persistence.
    pub storage: StorageConfig,

    /// Caller identity resolution.
    pub identity: IdentityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Settings that gate and parameterize every proxy round trip.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisraptorConfig {
    /// Master switch; when false neither proxy nor admin requests are served.
    pub enabled: bool,

    /// Shared secret sent to every upstream. Empty disables proxying (403).
    pub app_secret_key: String,

    /// Outbound read timeout in seconds.
    pub read_timeout_secs: u64,

    /// Outbound connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Path prefix reserved for administration; no route may start with it.
    pub reserved_prefix: String,

    /// Maximum inbound body size buffered for forwarding.
    pub max_body_bytes: usize,
}

impl DisraptorConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for DisraptorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_secret_key: String::new(),
            read_timeout_secs: 30,
            connect_timeout_secs: 5,
            reserved_prefix: "/admin".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration for the inbound side.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Where the key-value store keeps its data.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file backing the store. `None` keeps everything in memory.
    pub path: Option<String>,
}

/// Session-cookie based caller identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Name of the cookie carrying the session token.
    pub session_cookie: String,

    /// Known sessions.
    pub sessions: Vec<SessionConfig>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            session_cookie: "_disraptor_session".to_string(),
            sessions: Vec::new(),
        }
    }
}

/// A single session token and the caller it authenticates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

/// Group membership as reported by the session source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupConfig {
    pub id: u64,
    pub name: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
