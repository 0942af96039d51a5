//! `conduit-runtime`'s own error type, converting into [`conduit_core::AppError`]
//! at the caller-API boundary per §10.2.

use conduit_core::AppError;
use thiserror::Error;

/// Errors specific to turn-driving, prompt resolution, and refresh
/// scheduling. Anything that crosses into caller-facing territory
/// ([`AgentLoop::run_turn`](crate::agent_loop::AgentLoop::run_turn)'s
/// return type) is [`AppError`] directly; this enum covers the narrower
/// set of failures this crate itself can originate.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The loop exceeded its configured `max_tool_rounds`.
    #[error("tool loop exceeded ({max_rounds} rounds)")]
    ToolLoopExceeded {
        /// The configured cap that was hit.
        max_rounds: u32,
    },

    /// The turn was cancelled before it completed.
    #[error("turn cancelled")]
    Cancelled,

    /// The upstream provider stream failed mid-turn.
    #[error("stream failure: {0}")]
    StreamFailure(String),

    /// A tool dispatch could not even be attempted (distinct from a tool
    /// *running* and failing, which is surfaced as a tool result instead).
    #[error("tool dispatch error: {0}")]
    ToolDispatch(String),

    /// No refreshable OAuth credential under this name.
    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    /// An error from a lower layer ([`conduit_llm`], [`conduit_mcp`],
    /// [`conduit_storage`], [`conduit_tools`]) that this crate forwards
    /// as-is.
    #[error(transparent)]
    App(#[from] AppError),
}

/// Convenience alias for `Result<T, RuntimeError>`.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl From<RuntimeError> for AppError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::ToolLoopExceeded { max_rounds } => Self::ToolLoopExceeded { max_rounds },
            RuntimeError::Cancelled => Self::Cancelled,
            RuntimeError::StreamFailure(msg) => Self::StreamFailure(msg),
            RuntimeError::ToolDispatch(msg) => Self::ToolExecutionError(msg),
            RuntimeError::CredentialNotFound(name) => Self::SessionNotFound(name),
            RuntimeError::App(app) => app,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_loop_exceeded_round_trips_into_app_error() {
        let err = RuntimeError::ToolLoopExceeded { max_rounds: 8 };
        let app: AppError = err.into();
        assert!(matches!(app, AppError::ToolLoopExceeded { max_rounds: 8 }));
    }
}
