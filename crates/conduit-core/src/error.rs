//! The caller-facing error kinds shared across the runtime.

use thiserror::Error;

/// All error kinds that can cross the caller API boundary (`run_turn`,
/// `stream_chat`, `create_session`, …). Crate-local errors (e.g. a storage
/// backend's own error enum) convert into one of these variants at the
/// point they leave their owning crate.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required option was missing (session name, authorization code, PKCE verifier, …).
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A `create_named` call targeted a key that already exists.
    #[error("uniqueness violation: {0}")]
    UniquenessViolation(String),

    /// Credentials failed validation or were rejected by the provider.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// No session exists under the given name.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The requested session name is invalid (e.g. exceeds the length bound).
    #[error("invalid session name: {0}")]
    InvalidSessionName(String),

    /// An unknown provider string was supplied.
    #[error("provider not supported: {0}")]
    ProviderNotSupported(String),

    /// `auth_type` is not one this provider supports.
    #[error("invalid auth type: {auth_type} for provider {provider}")]
    InvalidAuthType {
        /// The provider in question.
        provider: String,
        /// The rejected auth type.
        auth_type: String,
    },

    /// `model_id` was not supplied where required.
    #[error("missing model")]
    MissingModel,

    /// `messages` was empty where at least one message is required.
    #[error("empty messages")]
    EmptyMessages,

    /// `messages` contained a structurally invalid entry.
    #[error("invalid messages: {0}")]
    InvalidMessages(String),

    /// A suspending operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// The operation was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,

    /// A lower-level network error occurred (connection refused, DNS, TLS, …).
    #[error("network error: {0}")]
    NetworkError(String),

    /// The upstream responded with a non-2xx HTTP status.
    #[error("http error {status}: {body}")]
    HttpError {
        /// The HTTP status code.
        status: u16,
        /// The response body (may be truncated before logging).
        body: String,
    },

    /// A stored `refresh_token` was rejected (401 / `invalid_grant`).
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// A refresh attempt exhausted its retry budget.
    #[error("refresh failed after {retries} retries: {reason}")]
    RefreshFailed {
        /// Number of retries attempted.
        retries: u32,
        /// The last failure reason.
        reason: String,
    },

    /// The provider stream failed mid-turn.
    #[error("stream failure: {0}")]
    StreamFailure(String),

    /// A tool invocation failed (surfaced to the caller only when the tool
    /// layer itself, not the model-visible result, could not run at all).
    #[error("tool execution error: {0}")]
    ToolExecutionError(String),

    /// The agent loop exceeded `max_tool_rounds`.
    #[error("tool loop exceeded ({max_rounds} rounds)")]
    ToolLoopExceeded {
        /// The configured round cap that was hit.
        max_rounds: u32,
    },

    /// No MCP server currently provides the requested tool.
    #[error("mcp tool not found: {0}")]
    McpNotFound(String),

    /// An MCP JSON-RPC request failed.
    #[error("mcp request failed: {0}")]
    McpRequestFailed(String),

    /// A configuration file or value failed validation.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The storage backend reported a failure.
    #[error("storage error: {0}")]
    StorageError(String),
}

/// Convenience alias for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let err = AppError::ToolLoopExceeded { max_rounds: 8 };
        assert_eq!(err.to_string(), "tool loop exceeded (8 rounds)");

        let err = AppError::HttpError {
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "http error 429: rate limited");
    }

    #[test]
    fn invalid_auth_type_names_both_fields() {
        let err = AppError::InvalidAuthType {
            provider: "gemini".into(),
            auth_type: "oauth2-device".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid auth type: oauth2-device for provider gemini"
        );
    }
}
