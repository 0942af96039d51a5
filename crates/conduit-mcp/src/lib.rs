//! MCP client with server lifecycle management for the conduit agent
//! runtime (C7 `MCPClient`, C8 `MCPRegistry` + `ToolsCache`).
//!
//! # Architecture
//!
//! - [`config`] parses `mcp_settings.json` (stdio/http/sse server entries,
//!   `globalSettings`, `$VAR`/`${VAR}`/`${VAR:-default}` expansion).
//! - [`transport`] and [`connection`] implement the JSON-RPC 2.0 wire
//!   protocol and per-server connection state machine directly — no MCP
//!   SDK dependency.
//! - [`client`] manages one connection per configured server.
//! - [`registry`] resolves tool-name conflicts by priority/namespace and
//!   caches discovery results with a TTL.
//!
//! # Example
//!
//! ```rust,no_run
//! use conduit_mcp::{McpClient, McpRegistry, McpServerConfig, McpSettings};
//!
//! # async fn example() -> Result<(), conduit_mcp::McpError> {
//! let mut settings = McpSettings::default();
//! let mut filesystem = McpServerConfig::stdio("npx")
//!     .with_args(["-y", "@modelcontextprotocol/server-filesystem", "/tmp"])
//!     .trusted();
//! filesystem.name = "filesystem".to_string();
//! settings.add(filesystem);
//!
//! let client = McpClient::with_settings(settings);
//! let registry = McpRegistry::new(client);
//! registry.connect("filesystem").await?;
//!
//! let result = registry
//!     .call_tool("read_file", serde_json::json!({"path": "/tmp/test.txt"}))
//!     .await?;
//! println!("{}", result.text_content());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod client;
mod config;
mod connection;
mod error;
mod registry;
mod transport;
mod types;

pub use client::McpClient;
pub use config::{
    ConfirmationLevel, GlobalSettings, McpServerConfig, McpSettings, TransportType,
    expand_env_vars,
};
pub use connection::{ServerConnection, backoff_delay};
pub use error::{McpError, McpResult};
pub use registry::{
    CacheLookup, McpRegistry, RegistryEvent, ToolsCache, health_check_interval, should_serve_stale,
};
pub use types::{ConnectionState, ServerStatus, ToolContent, ToolDefinition, ToolResult};
