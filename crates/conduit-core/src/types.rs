//! The canonical, provider-neutral data model (§3 of the design).
//!
//! Everything here is plain data: no I/O, no provider knowledge. Storage
//! crates persist these shapes; provider crates translate to/from them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 3.1 `SavedAuthentication` — identity is the composite key
/// `(provider, auth_type, name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedAuthentication {
    /// Provider string, open set (`"openai"`, `"anthropic"`, `"gemini"`, …).
    pub provider: String,
    /// `api_key` or `oauth`.
    pub auth_type: AuthType,
    /// Human-assigned name, unique within `(provider, auth_type)`.
    pub name: String,
    /// Opaque credential map (string → string/number). Never logged raw.
    pub credentials: HashMap<String, Value>,
    /// Required iff `auth_type == oauth`.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub inserted_at: DateTime<Utc>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SavedAuthentication {
    /// Whether this record satisfies the oauth-credential invariant: at
    /// least one of `access_token`/`refresh_token` present, `expires_at` set.
    #[must_use]
    pub fn is_valid_oauth_record(&self) -> bool {
        if self.auth_type != AuthType::OAuth {
            return true;
        }
        self.expires_at.is_some()
            && (self.credentials.contains_key("access_token")
                || self.credentials.contains_key("refresh_token"))
    }

    /// A redacted view suitable for logs/telemetry — never emit `credentials` directly.
    #[must_use]
    pub fn redacted(&self) -> RedactedAuthentication<'_> {
        RedactedAuthentication {
            provider: &self.provider,
            auth_type: self.auth_type,
            name: &self.name,
            has_credentials: !self.credentials.is_empty(),
            expires_at: self.expires_at,
        }
    }
}

/// A redaction-safe projection of [`SavedAuthentication`] for logging.
#[derive(Debug)]
pub struct RedactedAuthentication<'a> {
    /// Provider string.
    pub provider: &'a str,
    /// Auth type.
    pub auth_type: AuthType,
    /// Credential record name.
    pub name: &'a str,
    /// Whether any credentials are present, without revealing them.
    pub has_credentials: bool,
    /// Expiry, if any.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Supported authentication mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// A static API key.
    ApiKey,
    /// OAuth access/refresh token pair.
    OAuth,
    /// Google service-account credentials (Gemini only).
    ServiceAccount,
}

/// 3.2 Session — a configured (auth, model, tools, prompts) binding a
/// caller drives turns against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session id.
    pub id: Uuid,
    /// Caller-assigned name (max 50 chars, enforced at creation).
    pub name: String,
    /// References an existing `SavedAuthentication` by `(provider, auth_type, name)`.
    pub auth_id: (String, AuthType, String),
    /// Model identifier passed to the provider.
    pub model_id: String,
    /// Base directory built-in file/shell tools are confined to.
    pub working_dir: std::path::PathBuf,
    /// Enabled built-in tool names plus attached MCP server bindings.
    pub tools: Vec<String>,
    /// Per-provider pinned system-prompt stacks, if any.
    pub system_prompt_ids_by_provider: HashMap<String, Vec<SystemPromptBinding>>,
}

/// One entry of a session's pinned system-prompt stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPromptBinding {
    /// The bound `SystemPromptItem` id.
    pub id: Uuid,
    /// Whether this binding is active (skipped if `false`).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-session overrides merged into the rendered payload.
    #[serde(default)]
    pub overrides: HashMap<String, Value>,
}

const fn default_true() -> bool {
    true
}

/// Actor that produced a [`ChatEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// A human user.
    User,
    /// The model.
    Assistant,
    /// A system-level entry (e.g. prompt injection record).
    System,
    /// A tool result entry.
    Tool,
}

/// 3.3 `ChatEntry` — one turn's worth of canonical chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Entry id.
    pub id: Uuid,
    /// Owning session, or `None` for an orphaned thread.
    pub session_id: Option<Uuid>,
    /// Thread this entry belongs to.
    pub thread_id: Uuid,
    /// Monotonically increasing index within `thread_id`, starting at 0.
    pub turn_index: u32,
    /// Who produced this entry.
    pub actor: Actor,
    /// Canonical, provider-neutral chat payload: `{"messages": [...]}`.
    pub combined_chat: Value,
    /// Insertion timestamp.
    pub inserted_at: DateTime<Utc>,
}

/// How a [`SystemPromptItem`] should be rendered for a given provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRenderFormat {
    /// Flat text segments (OpenAI).
    Text,
    /// Anthropic content blocks.
    AnthropicBlocks,
    /// Gemini parts.
    GeminiParts,
}

/// 3.4 `SystemPromptItem` (`SuppliedContextItem`) — one immutable revision
/// in a versioned prompt lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPromptItem {
    /// Revision id.
    pub id: Uuid,
    /// Lineage id shared by all revisions of the same logical prompt.
    pub family_id: Uuid,
    /// Target provider, or `"shared"` to apply across all providers.
    pub provider: String,
    /// Rendering format for this revision.
    pub render_format: PromptRenderFormat,
    /// Monotonically increasing within `family_id`, starting at 1.
    pub version: u32,
    /// Exactly one revision per family has `is_default == true`.
    pub is_default: bool,
    /// The prompt text.
    pub text: String,
    /// Structured extras (`segments`/`blocks`/`parts`) consumed at render time.
    pub metadata: Value,
    /// Who authored this revision.
    pub editor: Option<String>,
    /// Free-text changelog note.
    pub change_note: Option<String>,
    /// Insertion timestamp.
    pub inserted_at: DateTime<Utc>,
}

/// 3.5 `MCPServer` configuration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServer {
    /// Server id.
    pub id: Uuid,
    /// Unique canonical name, used as the tool-namespace prefix.
    pub name: String,
    /// Human-facing display name.
    pub display_name: String,
    /// Transport kind.
    pub transport: Transport,
    /// Endpoint URL (`http`/`sse` transports).
    pub url: Option<String>,
    /// Subprocess command (`stdio` transport).
    pub command: Option<String>,
    /// Subprocess arguments.
    pub args: Vec<String>,
    /// Headers, subject to `$VAR`/`${VAR}`/`${VAR:-default}` expansion.
    pub headers: HashMap<String, String>,
    /// Environment variables, subject to the same expansion.
    pub env: HashMap<String, String>,
    /// Free-form metadata (e.g. `tool_cache_ttl_minutes`).
    pub metadata: Value,
    /// Arbitrary classification tags.
    pub tags: Vec<String>,
    /// Bearer token, if the server needs out-of-band auth beyond `headers`.
    pub auth_token: Option<String>,
    /// Whether this server is currently enabled.
    pub is_enabled: bool,
    /// Whether tool calls against this server require confirmation.
    pub trust: Trust,
}

impl McpServer {
    /// A redacted view suitable for logs — never emit `auth_token`/`headers`/`env` directly.
    #[must_use]
    pub fn redacted(&self) -> RedactedMcpServer<'_> {
        RedactedMcpServer {
            id: self.id,
            name: &self.name,
            transport: self.transport,
            is_enabled: self.is_enabled,
            trust: self.trust,
            has_auth_token: self.auth_token.is_some(),
        }
    }
}

/// Redaction-safe projection of [`McpServer`] for logging.
#[derive(Debug)]
pub struct RedactedMcpServer<'a> {
    /// Server id.
    pub id: Uuid,
    /// Server name.
    pub name: &'a str,
    /// Transport kind.
    pub transport: Transport,
    /// Enabled flag.
    pub is_enabled: bool,
    /// Trust level.
    pub trust: Trust,
    /// Whether an auth token is configured, without revealing it.
    pub has_auth_token: bool,
}

/// MCP connection transport kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// A child process speaking JSON-RPC over stdio.
    Stdio,
    /// Request/response JSON-RPC over HTTP POST.
    Http,
    /// A long-lived SSE connection plus companion POST requests.
    Sse,
}

/// Whether tool calls against a server require user confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trust {
    /// Tool calls execute without confirmation.
    Trusted,
    /// Tool calls require confirmation (confirmation flow is a caller concern).
    Untrusted,
}

/// 3.6 Canonical `StreamEvent` — the single typed event sequence every
/// provider handler folds its wire format into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A text delta to append to the running response.
    Content {
        /// The delta text.
        content: String,
    },
    /// One or more tool calls the model has requested.
    FunctionCall {
        /// The tool calls, in the order the model emitted them.
        tool_calls: Vec<ToolCall>,
    },
    /// Token usage reported by the provider.
    Usage {
        /// Usage totals.
        usage: Usage,
    },
    /// The stream has ended successfully.
    Done,
    /// The stream ended in an error.
    Error {
        /// A human-readable description of the failure.
        message: String,
    },
}

impl StreamEvent {
    /// Construct a `content` event.
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content {
            content: text.into(),
        }
    }

    /// Construct a `function_call` event.
    #[must_use]
    pub fn function_call(tool_calls: Vec<ToolCall>) -> Self {
        Self::FunctionCall { tool_calls }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned (or locally allocated) call id.
    pub id: String,
    /// Tool name, possibly `<server_id>__<tool>` namespaced.
    pub name: String,
    /// Raw JSON-encoded arguments string, as the model produced it.
    pub arguments: String,
}

/// Token usage totals, componentwise-summable across a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt/input tokens.
    pub prompt_tokens: u64,
    /// Completion/output tokens.
    pub completion_tokens: u64,
    /// `prompt_tokens + completion_tokens`, as reported (not recomputed).
    pub total_tokens: u64,
}

impl Usage {
    /// Componentwise-add two usage totals (used when folding `usage` events
    /// across multiple provider round-trips within one turn).
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens.saturating_add(other.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(other.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }
}

/// 3.7 Canonical `Message` (wire-neutral).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role.
    pub role: MessageRole,
    /// Either plain text or a sequence of multimodal parts.
    pub content: MessageBody,
}

impl Message {
    /// Construct a plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageBody::Text(text.into()),
        }
    }

    /// Construct a plain-text assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageBody::Text(text.into()),
        }
    }

    /// Construct a multi-part user message (e.g. text + tool-result parts).
    #[must_use]
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageBody::Parts(parts),
        }
    }

    /// Borrow the text body, if this message is plain text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageBody::Text(s) => Some(s),
            MessageBody::Parts(_) => None,
        }
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// A human user.
    User,
    /// The model.
    Assistant,
    /// A system-level instruction.
    System,
    /// A tool result.
    Tool,
}

/// Message content: either plain text or a sequence of multimodal parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    /// Plain text.
    Text(String),
    /// Multimodal content parts.
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// An inline image.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type, e.g. `"image/png"`.
        mime_type: String,
    },
    /// An inline document (e.g. PDF).
    Document {
        /// Base64-encoded document bytes.
        data: String,
        /// MIME type, e.g. `"application/pdf"`.
        mime_type: String,
    },
    /// The result of a dispatched tool call, carried provider-neutrally so
    /// each wire encoder can render it in that provider's native shape
    /// (OpenAI `function_call_output`, Anthropic `tool_result`, Gemini
    /// `functionResponse`) instead of double-encoding it as JSON-in-text.
    ToolResult {
        /// The id the model assigned to the originating tool call.
        call_id: String,
        /// The tool's name, needed by providers (Gemini) that key the
        /// response on name rather than call id alone.
        name: String,
        /// The tool's string output.
        output: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_add_is_componentwise() {
        let a = Usage {
            prompt_tokens: 5,
            completion_tokens: 1,
            total_tokens: 6,
        };
        let b = Usage {
            prompt_tokens: 10,
            completion_tokens: 4,
            total_tokens: 14,
        };
        let sum = a.add(b);
        assert_eq!(sum.prompt_tokens, 15);
        assert_eq!(sum.completion_tokens, 5);
        assert_eq!(sum.total_tokens, 20);
    }

    #[test]
    fn stream_event_serializes_with_tag() {
        let event = StreamEvent::content("Hello");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "content");
        assert_eq!(json["content"], "Hello");
    }

    #[test]
    fn oauth_record_requires_expiry_and_a_token() {
        let mut rec = SavedAuthentication {
            provider: "anthropic".into(),
            auth_type: AuthType::OAuth,
            name: "default".into(),
            credentials: HashMap::new(),
            expires_at: None,
            inserted_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!rec.is_valid_oauth_record());

        rec.expires_at = Some(Utc::now());
        rec.credentials
            .insert("refresh_token".into(), Value::String("r".into()));
        assert!(rec.is_valid_oauth_record());
    }

    #[test]
    fn api_key_record_ignores_expiry_invariant() {
        let rec = SavedAuthentication {
            provider: "openai".into(),
            auth_type: AuthType::ApiKey,
            name: "default".into(),
            credentials: HashMap::from([("api_key".to_string(), Value::String("sk-x".into()))]),
            expires_at: None,
            inserted_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(rec.is_valid_oauth_record());
    }

    #[test]
    fn message_text_accessor() {
        let msg = Message::user("hi");
        assert_eq!(msg.text(), Some("hi"));

        let msg = Message::user_parts(vec![ContentPart::Text { text: "hi".into() }]);
        assert_eq!(msg.text(), None);
    }
}
