//! Provider-neutral streaming chat abstraction for the conduit agent
//! runtime (C9 `ProviderRouter`).
//!
//! # Architecture
//!
//! - [`anthropic`], [`openai`], [`gemini`] each translate the canonical
//!   [`conduit_core::types::Message`] wire model into that provider's
//!   native request body and decode its SSE stream back into
//!   [`conduit_core::types::StreamEvent`]s.
//! - [`sse`] is the shared `text/event-stream` frame decoder every
//!   provider handler folds.
//! - [`http_factory`] builds the single pooled, SSRF-safe `reqwest::Client`
//!   and resolves per-`(provider, auth_type)` base URLs and headers.
//! - [`router`] is the public facade: `create_session`, `list_models`,
//!   `stream_chat`, `refresh_tokens`, `delete_session`.
//!
//! # Example
//!
//! ```rust,no_run
//! use conduit_llm::router::{CreateSessionOptions, ProviderRouter, CredentialSource};
//!
//! # async fn example(credentials: impl CredentialSource) -> conduit_core::error::AppResult<()> {
//! let router = ProviderRouter::new(credentials)?;
//! let models = router.list_models("anthropic", conduit_core::types::AuthType::ApiKey, "default").await?;
//! println!("{} models available", models.len());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod anthropic;
pub mod gemini;
pub mod http_factory;
pub mod openai;
pub mod prelude;
pub mod router;
pub mod sse;

pub use http_factory::HttpClientFactory;
pub use router::{CreateSessionOptions, CredentialSource, EventStream, ModelInfo, ProviderRouter};
