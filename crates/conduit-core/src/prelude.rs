//! Commonly used types for convenient import.
//!
//! ```rust
//! use conduit_core::prelude::*;
//! ```

pub use crate::error::{AppError, AppResult};
pub use crate::retry::{RetryPolicy, backoff_delay};
pub use crate::types::{
    Actor, ChatEntry, ContentPart, McpServer, Message, PromptRenderFormat, SavedAuthentication,
    Session, StreamEvent, SystemPromptItem, Transport, ToolCall, Trust, Usage,
};
