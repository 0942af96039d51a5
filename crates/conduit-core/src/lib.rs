//! Canonical data model, error types, and shared utilities for the conduit
//! agent orchestration runtime.
//!
//! This crate has no knowledge of any specific LLM vendor, transport, or
//! storage backend — it defines the provider-neutral shapes (`Message`,
//! `StreamEvent`, `Session`, …) that the rest of the workspace converts
//! to and from.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod http;
pub mod prelude;
pub mod retry;
pub mod types;

pub use error::{AppError, AppResult};
pub use retry::{RetryPolicy, backoff_delay};
pub use types::{
    Actor, ChatEntry, ContentPart, McpServer, Message, PromptRenderFormat, SavedAuthentication,
    Session, StreamEvent, SystemPromptItem, Transport, ToolCall, Trust, Usage,
};
