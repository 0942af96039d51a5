//! Crate-local error type for the MCP client and registry.

use thiserror::Error;

/// Errors raised by MCP connection management, transports, and the registry.
#[derive(Debug, Error)]
pub enum McpError {
    /// No server is configured under this name.
    #[error("unknown mcp server: {0}")]
    ServerNotFound(String),

    /// The server is configured but not currently connected.
    #[error("mcp server not running: {name}")]
    ServerNotRunning {
        /// The server name.
        name: String,
    },

    /// Launching the transport (spawning a subprocess, opening a socket) failed.
    #[error("failed to connect to mcp server {name}: {reason}")]
    ConnectionFailed {
        /// The server name.
        name: String,
        /// The underlying failure.
        reason: String,
    },

    /// The connection dropped while a request was outstanding.
    #[error("mcp server {0} closed the connection")]
    ConnectionClosed(String),

    /// A request exceeded its configured timeout.
    #[error("mcp request to {server} timed out after {timeout_ms}ms")]
    Timeout {
        /// The server name.
        server: String,
        /// The configured timeout.
        timeout_ms: u64,
    },

    /// `tools/call` returned a JSON-RPC error or an `isError` result.
    #[error("tool call failed on {server}::{tool}: {reason}")]
    ToolCallFailed {
        /// The server name.
        server: String,
        /// The tool name.
        tool: String,
        /// The failure reason.
        reason: String,
    },

    /// The requested tool is not known on the named server.
    #[error("tool {tool} not found on server {server}")]
    ToolNotFound {
        /// The server name.
        server: String,
        /// The tool name.
        tool: String,
    },

    /// The peer sent a message that didn't parse as JSON-RPC, or violated
    /// the expected protocol shape.
    #[error("mcp protocol error from {server}: {reason}")]
    ProtocolError {
        /// The server name.
        server: String,
        /// The failure reason.
        reason: String,
    },

    /// The `mcp_settings.json` file failed to parse or validate.
    #[error("invalid mcp configuration: {0}")]
    ConfigInvalid(String),

    /// Filesystem I/O failure while loading/saving configuration or running
    /// a stdio transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport failure.
    #[error("http transport error: {0}")]
    Http(String),
}

/// Convenience alias for `Result<T, McpError>`.
pub type McpResult<T> = Result<T, McpError>;

impl From<McpError> for conduit_core::error::AppError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::ServerNotFound(name) | McpError::ServerNotRunning { name } => {
                Self::McpNotFound(name)
            },
            McpError::ToolNotFound { server, tool } => {
                Self::McpNotFound(format!("{server}__{tool}"))
            },
            other => Self::McpRequestFailed(other.to_string()),
        }
    }
}
