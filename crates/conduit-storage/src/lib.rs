//! Persistence for the conduit agent orchestration runtime: C1
//! [`CredentialStore`], C11 [`ConversationStore`], and the `supplied_context_items`
//! store backing C5 ([`PromptStore`]) — all on an embedded `SurrealDB`
//! ([`Database`]).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod conversation;
pub mod credentials;
pub mod db;
pub mod error;
pub mod prompts;

pub use conversation::ConversationStore;
pub use credentials::{CredentialPatch, CredentialStore};
pub use db::Database;
pub use error::{StorageError, StorageResult};
pub use prompts::PromptStore;
