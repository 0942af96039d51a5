//! §3.2 `Session` working state — the in-memory counterpart the agent loop
//! actually drives a turn against, as opposed to the persisted row
//! ([`conduit_core::types::Session`]) `conduit-storage` reads and writes.
//!
//! Carries conversation state plus a workspace-confined execution context
//! across turns: no capability store, allowance store, approval manager,
//! budget tracker, or sub-agent bookkeeping — just what a turn needs to
//! authenticate, append messages, and run tools.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use conduit_core::types::{AuthType, Message, Usage};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A session's live working state for one or more turns.
#[derive(Debug)]
pub struct AgentSession {
    /// The persisted session id this working state belongs to, or `None`
    /// for a session-less (orphaned-thread) turn.
    pub session_id: Option<Uuid>,
    /// The conversation thread this session's turns append to.
    pub thread_id: Uuid,
    /// Provider string (`"openai"`, `"anthropic"`, `"gemini"`).
    pub provider: String,
    /// Which credential type this session authenticates with.
    pub auth_type: AuthType,
    /// The named credential record (`CredentialStore` key) this session's
    /// turns authenticate with.
    pub credential_name: String,
    /// Model id passed to the provider on every turn.
    pub model_id: String,
    /// Accumulated conversation history, provider-neutral.
    pub messages: Vec<Message>,
    /// Built-in tool/shell executions are confined to this directory
    /// (§4.6 Security).
    pub working_dir: PathBuf,
    /// Current working directory, shared across shell invocations within
    /// the session so a `cd` persists turn-to-turn.
    pub cwd: Arc<RwLock<PathBuf>>,
    /// Enabled tool names (built-in and/or MCP, unprefixed or namespaced).
    pub enabled_tools: Vec<String>,
    /// Running total across every turn this session has completed.
    pub lifetime_usage: Usage,
    /// When this working state was created.
    pub created_at: DateTime<Utc>,
}

impl AgentSession {
    /// Start a fresh session working state rooted at `working_dir`, with a
    /// newly allocated thread id.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        auth_type: AuthType,
        credential_name: impl Into<String>,
        model_id: impl Into<String>,
        working_dir: PathBuf,
    ) -> Self {
        Self::resume(
            provider,
            auth_type,
            credential_name,
            model_id,
            working_dir,
            Uuid::new_v4(),
            None,
            Vec::new(),
        )
    }

    /// Resume an existing thread — e.g. re-attaching to a session whose
    /// `latest_thread` history was loaded from [`conduit_storage::ConversationStore`].
    #[must_use]
    pub fn resume(
        provider: impl Into<String>,
        auth_type: AuthType,
        credential_name: impl Into<String>,
        model_id: impl Into<String>,
        working_dir: PathBuf,
        thread_id: Uuid,
        session_id: Option<Uuid>,
        messages: Vec<Message>,
    ) -> Self {
        let cwd = Arc::new(RwLock::new(working_dir.clone()));
        Self {
            session_id,
            thread_id,
            provider: provider.into(),
            auth_type,
            credential_name: credential_name.into(),
            model_id: model_id.into(),
            messages,
            working_dir,
            cwd,
            enabled_tools: Vec::new(),
            lifetime_usage: Usage::default(),
            created_at: Utc::now(),
        }
    }

    /// Enable a set of tool names for this session (built-in and/or MCP).
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.enabled_tools = tools;
        self
    }

    /// Append a message to the running conversation.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Fold a turn's usage into the session's lifetime total.
    pub fn record_usage(&mut self, usage: Usage) {
        self.lifetime_usage = self.lifetime_usage.add(usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_with_a_fresh_thread_and_empty_history() {
        let session = AgentSession::new(
            "anthropic",
            AuthType::ApiKey,
            "default",
            "claude-sonnet",
            PathBuf::from("/tmp/ws"),
        );
        assert!(session.messages.is_empty());
        assert_eq!(session.lifetime_usage, Usage::default());
    }

    #[test]
    fn resume_preserves_the_given_thread_and_session_id() {
        let thread = Uuid::new_v4();
        let sid = Uuid::new_v4();
        let session = AgentSession::resume(
            "openai",
            AuthType::OAuth,
            "default",
            "gpt-5",
            PathBuf::from("/tmp/ws"),
            thread,
            Some(sid),
            vec![Message::user("hi")],
        );
        assert_eq!(session.thread_id, thread);
        assert_eq!(session.session_id, Some(sid));
        assert_eq!(session.messages.len(), 1);
    }

    #[test]
    fn record_usage_accumulates_across_calls() {
        let mut session =
            AgentSession::new("openai", AuthType::ApiKey, "default", "gpt-5", PathBuf::from("/tmp/ws"));
        session.record_usage(Usage { prompt_tokens: 5, completion_tokens: 1, total_tokens: 6 });
        session.record_usage(Usage { prompt_tokens: 10, completion_tokens: 4, total_tokens: 14 });
        assert_eq!(session.lifetime_usage.total_tokens, 20);
    }
}
