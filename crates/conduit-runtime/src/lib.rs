//! The ReAct turn driver for the conduit agent orchestration runtime.
//!
//! This crate wires together the provider router ([`conduit_llm`]), the
//! tool registry and MCP tool pool ([`conduit_tools`]/[`conduit_mcp`]), and
//! persisted conversation/credential state ([`conduit_storage`]) into the
//! three components the rest of the workspace is built to support:
//!
//! - [`prompt_stack`] — C5: resolve and render a session's system-prompt
//!   stack for a given provider.
//! - [`agent_loop`] — C10: the ReAct state machine (stream → tool dispatch
//!   → stream) bounded by a hard tool-round cap.
//! - [`refresh_worker`] — C12: scheduled OAuth token refresh.
//!
//! [`session`] and [`tool_dispatch`] are the supporting plumbing: a
//! session's working state, and the dispatcher that turns a model's
//! [`conduit_core::types::ToolCall`] into a built-in or MCP invocation.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod agent_loop;
pub mod error;
pub mod prelude;
pub mod prompt_stack;
pub mod refresh_worker;
pub mod session;
pub mod storage_bridge;
pub mod tool_dispatch;

pub use agent_loop::{AgentLoop, TurnFailure, TurnOptions, TurnOutcome, TurnToolRecord};
pub use error::{RuntimeError, RuntimeResult};
pub use prompt_stack::{PromptPayload, PromptStack};
pub use refresh_worker::{ProviderClientIds, TokenRefreshWorker};
pub use session::AgentSession;
pub use storage_bridge::{StorageCredentials, StoragePrompts};
pub use tool_dispatch::ToolDispatcher;
