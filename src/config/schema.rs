//! Configuration schema definitions.
//!
//! All sections carry `#[serde(default)]` so a minimal (or empty) TOML file
//! yields a runnable configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the request bin.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BinConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request history storage.
    pub store: StoreConfig,

    /// Live event stream settings.
    pub stream: StreamConfig,

    /// HTTP API limits and defaults.
    pub http: HttpConfig,

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

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout for regular API calls in seconds.
    /// The live event stream is exempt.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request history storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of records retained; oldest are evicted first.
    /// `0` keeps every record.
    pub max_records: usize,

    /// Optional JSON snapshot file loaded at startup and written at shutdown.
    pub snapshot_path: Option<String>,

    /// Upper bound for a single storage call in milliseconds.
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_records: 0,
            snapshot_path: None,
            timeout_ms: 2_000,
        }
    }
}

/// Live event stream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Heartbeat interval in seconds.
    pub heartbeat_secs: u64,

    /// Per-subscriber event buffer. A subscriber whose buffer is full is
    /// treated as dead on the next push.
    pub buffer_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 30,
            buffer_capacity: 64,
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Number of records returned by the history endpoint without `limit`.
    pub default_history_limit: usize,

    /// Upper bound for the `limit` query parameter.
    pub max_history_limit: usize,

    /// Maximum captured body size in bytes. Larger bodies are recorded
    /// with the decode-failure placeholder.
    pub max_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            default_history_limit: 50,
            max_history_limit: 500,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "request_bin=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
