//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the session server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Per-session protocol settings.
    pub session: SessionConfig,

    /// Settings handed to the default application.
    pub app: AppConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// What to do with a `Connection: upgrade` request naming a protocol we do
/// not speak.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownUpgrade {
    /// Ignore the upgrade intent and dispatch the request as plain HTTP.
    #[default]
    FallThrough,
    /// Close the session with a protocol error.
    Reject,
}

/// Per-session protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval of the periodic `manage()` tick in seconds.
    pub manage_interval_secs: u64,

    /// A session with no inbound traffic for this long is killed.
    pub idle_timeout_secs: u64,

    /// Largest accepted request head (start line + headers) in bytes.
    pub max_header_bytes: usize,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Policy for unrecognized upgrade targets.
    pub unknown_upgrade: UnknownUpgrade,

    /// Value of the `Server` response header.
    pub server_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            manage_interval_secs: 5,
            idle_timeout_secs: 60,
            max_header_bytes: 16 * 1024,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            unknown_upgrade: UnknownUpgrade::FallThrough,
            server_name: "stream-session".to_string(),
        }
    }
}

/// Default application configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Directory served as static content.
    pub www_root: String,

    /// Index resource handed to every connecting session, if any.
    pub index: Option<String>,

    /// Whether directories without an index may be listed.
    pub directory_listing: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            www_root: "./www".to_string(),
            index: None,
            directory_listing: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
