//! MCP wire types: JSON-RPC envelopes, tool definitions/results, and
//! connection status.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self { jsonrpc: "2.0", id, method: method.into(), params }
    }
}

/// A JSON-RPC 2.0 notification (no `id`, no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A decoded JSON-RPC response or error, keyed by the request `id` it
/// answers.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorPayload>,
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorPayload {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A raw inbound line that is either a response (has `id` and `result`/
/// `error`) or a notification (has `method`, no `id`). Distinguishing them
/// requires looking at which fields are present, since both share the
/// `jsonrpc` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcInbound {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorPayload>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcInbound {
    /// Whether this line answers an outstanding request.
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.id.is_some() && self.method.is_none()
    }
}

/// Definition of one tool exposed by an MCP server, as discovered via
/// `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name as the server names it (unprefixed).
    pub name: String,
    /// Server this tool belongs to.
    pub server: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// JSON Schema for input parameters.
    pub input_schema: Value,
}

impl ToolDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            description: None,
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    /// Parse one entry of a `tools/list` result.
    #[must_use]
    pub fn from_wire(value: &Value, server: &str) -> Self {
        Self {
            name: value.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
            server: server.to_string(),
            description: value.get("description").and_then(Value::as_str).map(str::to_string),
            input_schema: value
                .get("inputSchema")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({"type": "object"})),
        }
    }

    /// The namespaced identifier (`server__tool`) per §4.8.
    #[must_use]
    pub fn namespaced_name(&self) -> String {
        format!("{}__{}", self.server, self.name)
    }
}

/// Result of a `tools/call` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the call succeeded.
    pub success: bool,
    /// Content blocks returned by the tool.
    pub content: Vec<ToolContent>,
    /// Error message, set when `is_error` is true.
    pub error: Option<String>,
    /// Whether the server flagged this result as an error (`isError: true`).
    pub is_error: bool,
}

impl ToolResult {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: vec![ToolContent::Text { text: content.into() }],
            error: None,
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        let msg = message.into();
        Self {
            success: false,
            content: vec![ToolContent::Text { text: msg.clone() }],
            error: Some(msg),
            is_error: true,
        }
    }

    /// Concatenate all text blocks, newline-separated.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                ToolContent::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse a `tools/call` JSON-RPC result payload.
    #[must_use]
    pub fn from_wire(value: &Value) -> Self {
        let is_error = value.get("isError").and_then(Value::as_bool).unwrap_or(false);
        let content: Vec<ToolContent> = value
            .get("content")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(ToolContent::from_wire).collect())
            .unwrap_or_default();

        let error = if is_error {
            let text = content
                .iter()
                .filter_map(|c| match c {
                    ToolContent::Text { text } => Some(text.as_str()),
                    ToolContent::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            Some(if text.is_empty() { "unknown error".to_string() } else { text })
        } else {
            None
        };

        Self { success: !is_error, content, error, is_error }
    }
}

/// Content block types returned by `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },
    /// Image content.
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type.
        mime_type: String,
    },
}

impl ToolContent {
    fn from_wire(value: &Value) -> Self {
        match value.get("type").and_then(Value::as_str) {
            Some("image") => Self::Image {
                data: value.get("data").and_then(Value::as_str).unwrap_or_default().to_string(),
                mime_type: value
                    .get("mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or("application/octet-stream")
                    .to_string(),
            },
            _ => Self::Text {
                text: value.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
            },
        }
    }
}

/// Connection lifecycle state for one server, per §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected and not attempting to connect.
    Disconnected,
    /// Transport is being established and `initialize` is in flight.
    Connecting,
    /// `initialize` succeeded; the connection is usable.
    Connected,
    /// The last attempt failed; a backoff-scheduled reconnect is pending.
    Error,
}

/// Point-in-time snapshot of one server's registry entry, per §4.8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Server name.
    pub id: String,
    /// Current connection state.
    pub status: ConnectionState,
    /// Tool-namespace priority.
    pub priority: i32,
    /// Milliseconds since epoch of the last successful health signal.
    pub last_heartbeat: Option<u64>,
    /// Consecutive failure count since the last success.
    pub error_count: u32,
    /// The most recent error message, if any.
    pub last_error: Option<String>,
    /// Whether this server is trusted.
    pub trust: bool,
}

/// Milliseconds since the Unix epoch, for cache/heartbeat timestamps.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_name_joins_with_double_underscore() {
        let tool = ToolDefinition::new("read_file", "filesystem");
        assert_eq!(tool.namespaced_name(), "filesystem__read_file");
    }

    #[test]
    fn tool_result_text_helper() {
        let result = ToolResult::text("hi");
        assert!(result.success);
        assert_eq!(result.text_content(), "hi");
    }

    #[test]
    fn tool_result_from_wire_error() {
        let value = serde_json::json!({
            "isError": true,
            "content": [{"type": "text", "text": "boom"}],
        });
        let result = ToolResult::from_wire(&value);
        assert!(result.is_error);
        assert_eq!(result.error, Some("boom".to_string()));
    }

    #[test]
    fn tool_definition_from_wire_defaults_missing_schema() {
        let value = serde_json::json!({"name": "ping", "description": "pings"});
        let tool = ToolDefinition::from_wire(&value, "health");
        assert_eq!(tool.input_schema, serde_json::json!({"type": "object"}));
        assert_eq!(tool.description.as_deref(), Some("pings"));
    }

    #[test]
    fn inbound_distinguishes_response_from_notification() {
        let response: JsonRpcInbound = serde_json::from_str(r#"{"id":1,"result":{}}"#).unwrap();
        assert!(response.is_response());

        let notice: JsonRpcInbound =
            serde_json::from_str(r#"{"method":"notifications/tools/list_changed"}"#).unwrap();
        assert!(!notice.is_response());
    }
}
