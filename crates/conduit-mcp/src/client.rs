//! Multi-server MCP client.
//!
//! `McpClient` owns one [`ServerConnection`] per configured server and
//! exposes the high-level `connect`/`list_tools`/`call_tool` surface that
//! [`crate::registry::McpRegistry`] and the agent loop consume. State is
//! `Arc`-wrapped so the client is cheaply `Clone`-able; the wire protocol
//! is hand-rolled over [`crate::connection::ServerConnection`] rather than
//! an MCP SDK dependency.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::{GlobalSettings, McpServerConfig, McpSettings};
use crate::connection::ServerConnection;
use crate::error::{McpError, McpResult};
use crate::types::{ServerStatus, ToolDefinition, ToolResult};

/// MCP client for interacting with one or more configured servers.
#[derive(Clone)]
pub struct McpClient {
    connections: Arc<RwLock<HashMap<String, ServerConnection>>>,
    global: Arc<GlobalSettings>,
}

impl McpClient {
    /// Build a client from parsed settings; no connections are opened yet.
    #[must_use]
    pub fn with_settings(settings: McpSettings) -> Self {
        let connections = settings
            .list()
            .into_iter()
            .cloned()
            .map(|config| (config.name.clone(), ServerConnection::new(config)))
            .collect::<HashMap<_, _>>();

        Self {
            connections: Arc::new(RwLock::new(connections)),
            global: Arc::new(settings.global_settings),
        }
    }

    /// Load `mcp_settings.json` from the conventional location and build a
    /// client from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but fails to parse.
    pub fn from_default_config() -> McpResult<Self> {
        Ok(Self::with_settings(McpSettings::load_default()?))
    }

    /// Register a server at runtime (in addition to/replacing any loaded
    /// from configuration).
    pub async fn add_server(&self, config: McpServerConfig) {
        let name = config.name.clone();
        self.connections.write().await.insert(name, ServerConnection::new(config));
    }

    /// Connect a configured server (launches the transport and runs
    /// `initialize` + `tools/list`).
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ServerNotFound`] if `name` isn't configured, or
    /// whatever error the transport/handshake produced.
    pub async fn connect(&self, name: &str) -> McpResult<()> {
        let mut connections = self.connections.write().await;
        let conn = connections.get_mut(name).ok_or_else(|| McpError::ServerNotFound(name.to_string()))?;
        conn.connect(&self.global).await
    }

    /// Disconnect a server, leaving its configuration in place.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ServerNotFound`] if `name` isn't configured.
    pub async fn disconnect(&self, name: &str) -> McpResult<()> {
        let mut connections = self.connections.write().await;
        let conn = connections.get_mut(name).ok_or_else(|| McpError::ServerNotFound(name.to_string()))?;
        conn.disconnect().await;
        Ok(())
    }

    /// Disconnect every server.
    pub async fn disconnect_all(&self) {
        let mut connections = self.connections.write().await;
        for conn in connections.values_mut() {
            conn.disconnect().await;
        }
    }

    /// List the tools currently cached for one connected server.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ServerNotFound`] if `name` isn't configured.
    pub async fn list_tools(&self, name: &str) -> McpResult<Vec<ToolDefinition>> {
        let connections = self.connections.read().await;
        let conn = connections.get(name).ok_or_else(|| McpError::ServerNotFound(name.to_string()))?;
        Ok(conn.tools().to_vec())
    }

    /// List tools from every connected server.
    pub async fn all_tools(&self) -> Vec<ToolDefinition> {
        let connections = self.connections.read().await;
        connections.values().flat_map(|c| c.tools().to_vec()).collect()
    }

    /// Call one tool on one server.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ServerNotFound`] if `server` isn't configured, or
    /// [`McpError::ServerNotRunning`]/[`McpError::ToolCallFailed`] as
    /// appropriate.
    pub async fn call_tool(&self, server: &str, tool: &str, args: Value) -> McpResult<ToolResult> {
        let mut connections = self.connections.write().await;
        let conn = connections.get_mut(server).ok_or_else(|| McpError::ServerNotFound(server.to_string()))?;
        conn.call_tool(tool, args, &self.global).await
    }

    /// Re-run `tools/list` for one server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server isn't configured or isn't connected.
    pub async fn refresh_tools(&self, name: &str) -> McpResult<()> {
        let mut connections = self.connections.write().await;
        let conn = connections.get_mut(name).ok_or_else(|| McpError::ServerNotFound(name.to_string()))?;
        conn.refresh_tools(&self.global).await
    }

    /// Send `ping` to one server and record the heartbeat.
    ///
    /// # Errors
    ///
    /// Returns an error if the server isn't configured, isn't connected, or
    /// doesn't answer.
    pub async fn ping(&self, name: &str) -> McpResult<()> {
        let mut connections = self.connections.write().await;
        let conn = connections.get_mut(name).ok_or_else(|| McpError::ServerNotFound(name.to_string()))?;
        conn.ping(&self.global).await
    }

    /// Names of every configured server.
    pub async fn server_names(&self) -> Vec<String> {
        self.connections.read().await.keys().cloned().collect()
    }

    /// Whether a server is currently connected.
    pub async fn is_connected(&self, name: &str) -> bool {
        self.connections.read().await.get(name).is_some_and(ServerConnection::is_connected)
    }

    /// Status snapshots for every configured server, highest priority first.
    pub async fn statuses(&self) -> Vec<ServerStatus> {
        let connections = self.connections.read().await;
        let mut statuses: Vec<ServerStatus> = connections.values().map(ServerConnection::status).collect();
        statuses.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        statuses
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_client_has_no_servers() {
        let client = McpClient::with_settings(McpSettings::default());
        assert!(client.server_names().await.is_empty());
        assert!(client.all_tools().await.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_server_returns_not_found() {
        let client = McpClient::with_settings(McpSettings::default());
        let result = client.connect("missing").await;
        assert!(matches!(result, Err(McpError::ServerNotFound(_))));
    }

    #[tokio::test]
    async fn add_server_makes_it_listed() {
        let client = McpClient::with_settings(McpSettings::default());
        let mut config = McpServerConfig::stdio("true");
        config.name = "truthy".to_string();
        client.add_server(config).await;
        assert_eq!(client.server_names().await, vec!["truthy".to_string()]);
        assert!(!client.is_connected("truthy").await);
    }
}
