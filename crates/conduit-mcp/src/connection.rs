//! Per-server connection state machine, per §4.7.
//!
//! ```text
//! DISCONNECTED → CONNECTING → CONNECTED → (ERROR → CONNECTING*) → DISCONNECTED
//!                                        ↘ DISCONNECTED
//! ```

use std::time::Duration;

use serde_json::Value;

use crate::config::{GlobalSettings, McpServerConfig, TransportType};
use crate::error::{McpError, McpResult};
use crate::transport::Transport;
use crate::types::{ConnectionState, ServerStatus, ToolDefinition, ToolResult, now_ms};

/// Base delay for the first reconnect attempt.
const BACKOFF_BASE: Duration = Duration::from_secs(1);
/// Growth factor applied to the backoff delay after each failed attempt.
const BACKOFF_FACTOR: u32 = 2;
/// Upper bound on the backoff delay.
const BACKOFF_CAP: Duration = Duration::from_secs(60);
/// Jitter applied to the computed delay, as a fraction either side.
const BACKOFF_JITTER: f64 = 0.10;

/// Compute the exponential backoff delay for the `attempt`-th consecutive
/// failure (`attempt` is 1-based). Jitter is deterministic given `jitter_unit`
/// (a value in `[-1.0, 1.0]`) so callers can test boundary behavior; use a
/// real RNG sample in production call sites.
#[must_use]
pub fn backoff_delay(attempt: u32, jitter_unit: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let factor = BACKOFF_FACTOR.saturating_pow(exponent);
    let base = BACKOFF_BASE.saturating_mul(factor).min(BACKOFF_CAP);

    let jitter = jitter_unit.clamp(-1.0, 1.0) * BACKOFF_JITTER;
    let scaled_nanos = (base.as_nanos() as f64) * (1.0 + jitter);
    Duration::from_nanos(scaled_nanos.max(0.0) as u64).min(BACKOFF_CAP)
}

/// A single server's connection, transport, and health bookkeeping.
pub struct ServerConnection {
    name: String,
    config: McpServerConfig,
    transport: Option<Transport>,
    state: ConnectionState,
    error_count: u32,
    last_error: Option<String>,
    last_heartbeat: Option<u64>,
    tools: Vec<ToolDefinition>,
    http_client: reqwest::Client,
}

impl ServerConnection {
    #[must_use]
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            name: config.name.clone(),
            config,
            transport: None,
            state: ConnectionState::Disconnected,
            error_count: 0,
            last_error: None,
            last_heartbeat: None,
            tools: Vec::new(),
            http_client: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Launch the transport and send `initialize`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport can't be established or
    /// `initialize` fails; on failure the connection moves to `Error`.
    pub async fn connect(&mut self, global: &GlobalSettings) -> McpResult<()> {
        self.state = ConnectionState::Connecting;
        let timeout_ms = self.config.effective_timeout_ms(global);

        let transport = match self.config.transport_type {
            TransportType::Stdio => Transport::spawn_stdio(&self.name, &self.config),
            TransportType::Http => Ok(Transport::http(&self.config, self.http_client.clone())),
            TransportType::Sse => {
                Transport::connect_sse(&self.name, &self.config, self.http_client.clone()).await
            },
        };

        let transport = match transport {
            Ok(t) => t,
            Err(e) => {
                self.record_failure(e.to_string());
                return Err(e);
            },
        };

        let init_params = serde_json::json!({
            "protocolVersion": "2025-06-18",
            "clientInfo": {"name": "conduit", "version": env!("CARGO_PKG_VERSION")},
            "capabilities": {},
        });

        match transport.request(&self.name, "initialize", Some(init_params), timeout_ms).await {
            Ok(_) => {
                self.transport = Some(transport);
                self.state = ConnectionState::Connected;
                self.error_count = 0;
                self.last_error = None;
                self.last_heartbeat = Some(now_ms());
                self.refresh_tools(global).await?;
                Ok(())
            },
            Err(e) => {
                self.record_failure(e.to_string());
                Err(e)
            },
        }
    }

    /// Disconnect the transport and mark this server `Disconnected`.
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.state = ConnectionState::Disconnected;
        self.tools.clear();
    }

    fn record_failure(&mut self, reason: String) {
        self.error_count = self.error_count.saturating_add(1);
        self.last_error = Some(reason);
        self.state = ConnectionState::Error;
        self.transport = None;
    }

    /// Whether the circuit breaker has opened (consecutive failures reached
    /// `config.max_failures`).
    #[must_use]
    pub fn circuit_open(&self) -> bool {
        self.error_count >= self.config.max_failures
    }

    /// Backoff delay for the next reconnect attempt, given the current
    /// failure count.
    #[must_use]
    pub fn next_backoff(&self, jitter_unit: f64) -> Duration {
        backoff_delay(self.error_count.max(1), jitter_unit)
    }

    /// Re-fetch `tools/list` and replace the cached tool set.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not connected or the request fails.
    pub async fn refresh_tools(&mut self, global: &GlobalSettings) -> McpResult<()> {
        let transport = self.transport.as_ref().ok_or_else(|| McpError::ServerNotRunning {
            name: self.name.clone(),
        })?;
        let timeout_ms = self.config.effective_timeout_ms(global);

        let result = transport.request(&self.name, "tools/list", None, timeout_ms).await?;
        let entries = result.get("tools").and_then(Value::as_array).cloned().unwrap_or_default();
        self.tools = entries.iter().map(|v| ToolDefinition::from_wire(v, &self.name)).collect();
        Ok(())
    }

    #[must_use]
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Invoke `tools/call` for one tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not connected or the call fails.
    pub async fn call_tool(
        &mut self,
        tool: &str,
        arguments: Value,
        global: &GlobalSettings,
    ) -> McpResult<ToolResult> {
        let transport = self.transport.as_ref().ok_or_else(|| McpError::ServerNotRunning {
            name: self.name.clone(),
        })?;
        let timeout_ms = self.config.effective_timeout_ms(global);

        let params = serde_json::json!({ "name": tool, "arguments": arguments });
        let result = transport
            .request(&self.name, "tools/call", Some(params), timeout_ms)
            .await
            .map_err(|e| McpError::ToolCallFailed {
                server: self.name.clone(),
                tool: tool.to_string(),
                reason: e.to_string(),
            })?;

        self.last_heartbeat = Some(now_ms());
        Ok(ToolResult::from_wire(&result))
    }

    /// Send a `ping` and record the heartbeat on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not connected or does not answer
    /// within `timeout_ms`.
    pub async fn ping(&mut self, global: &GlobalSettings) -> McpResult<()> {
        let transport = self.transport.as_ref().ok_or_else(|| McpError::ServerNotRunning {
            name: self.name.clone(),
        })?;
        let timeout_ms = self.config.effective_timeout_ms(global);
        transport.request(&self.name, "ping", None, timeout_ms).await?;
        self.last_heartbeat = Some(now_ms());
        Ok(())
    }

    /// Point-in-time status snapshot for the registry.
    #[must_use]
    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            id: self.name.clone(),
            status: self.state,
            priority: self.config.priority,
            last_heartbeat: self.last_heartbeat,
            error_count: self.error_count,
            last_error: self.last_error.clone(),
            trust: self.config.trust,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let d1 = backoff_delay(1, 0.0);
        let d2 = backoff_delay(2, 0.0);
        let d3 = backoff_delay(3, 0.0);
        assert_eq!(d1, Duration::from_secs(1));
        assert_eq!(d2, Duration::from_secs(2));
        assert_eq!(d3, Duration::from_secs(4));

        let capped = backoff_delay(20, 0.0);
        assert_eq!(capped, BACKOFF_CAP);
    }

    #[test]
    fn backoff_jitter_stays_within_ten_percent() {
        let base = backoff_delay(3, 0.0);
        let high = backoff_delay(3, 1.0);
        let low = backoff_delay(3, -1.0);
        assert!(high > base);
        assert!(low < base);
        let expected_high = base.as_secs_f64() * 1.10;
        assert!((high.as_secs_f64() - expected_high).abs() < 0.01);
    }

    #[test]
    fn new_connection_starts_disconnected() {
        let conn = ServerConnection::new(McpServerConfig::stdio("true"));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.is_connected());
        assert!(conn.tools().is_empty());
    }

    #[test]
    fn circuit_opens_after_max_failures() {
        let mut conn = ServerConnection::new(McpServerConfig::stdio("nonexistent-binary-xyz"));
        conn.record_failure("boom".to_string());
        conn.record_failure("boom".to_string());
        assert!(!conn.circuit_open());
        conn.record_failure("boom".to_string());
        assert!(conn.circuit_open());
    }

    #[tokio::test]
    async fn connect_to_missing_binary_records_failure() {
        let mut conn = ServerConnection::new(McpServerConfig::stdio("nonexistent-binary-xyz"));
        let global = GlobalSettings::default();
        let result = conn.connect(&global).await;
        assert!(result.is_err());
        assert_eq!(conn.state(), ConnectionState::Error);
        assert_eq!(conn.status().error_count, 1);
    }
}
