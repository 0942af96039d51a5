//! Commonly used types for convenient import.
//!
//! ```rust
//! use conduit_runtime::prelude::*;
//! ```

pub use crate::agent_loop::{AgentLoop, TurnFailure, TurnOptions, TurnOutcome, TurnToolRecord};
pub use crate::error::{RuntimeError, RuntimeResult};
pub use crate::prompt_stack::{PromptPayload, PromptStack};
pub use crate::refresh_worker::{ProviderClientIds, TokenRefreshWorker};
pub use crate::session::AgentSession;
pub use crate::storage_bridge::{StorageCredentials, StoragePrompts};
pub use crate::tool_dispatch::ToolDispatcher;
