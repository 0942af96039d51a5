//! Commonly used types for convenient import.
//!
//! ```rust
//! use conduit_llm::prelude::*;
//! ```

pub use crate::http_factory::HttpClientFactory;
pub use crate::router::{
    CreateSessionOptions, CredentialSource, EventStream, ModelInfo, ProviderRouter, supported_auth_types,
};
