//! Configuration struct definitions (§10.3).
//!
//! Every section implements [`Default`] with a production-sensible value so
//! a bare `[section]` header — or an absent one entirely — still produces a
//! working [`Config`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the conduit runtime process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Structured logging setup.
    pub log: LogSection,
    /// Persisted-state storage location.
    pub storage: StorageSection,
    /// Per-operation timeout budgets.
    pub timeouts: TimeoutsSection,
    /// Agent turn-loop limits.
    pub runtime: RuntimeSection,
    /// Outbound HTTP connection pooling.
    pub http: HttpSection,
}

/// Structured logging setup (§10.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// `trace`/`debug`/`info`/`warn`/`error`, or an `env-filter` directive string.
    pub level: String,
    /// `pretty`, `json`, or `compact` — maps to `conduit_telemetry::logging::LogFormat`.
    pub format: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Storage backend location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Path to the embedded database file, or `:memory:` for `kv-mem`.
    pub path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self { path: PathBuf::from(":memory:") }
    }
}

/// Timeout budgets for network operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    /// Non-streaming HTTP request timeout, in seconds.
    pub request_secs: u64,
    /// Maximum gap between SSE events before a stream is considered stalled, in seconds.
    pub stream_idle_secs: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self { request_secs: 120, stream_idle_secs: 60 }
    }
}

/// Agent turn-loop limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Hard cap on STREAMING→TOOL_DISPATCH rounds per turn (§4.10).
    pub max_tool_rounds: u32,
    /// Bounded concurrency for a single round's tool dispatch (§5).
    pub tool_concurrency: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self { max_tool_rounds: 8, tool_concurrency: 4 }
    }
}

/// Outbound HTTP client pooling (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Maximum idle connections kept per host in the shared pool.
    pub pool_size: usize,
    /// TCP connect timeout, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self { pool_size: 32, connect_timeout_secs: 10 }
    }
}
