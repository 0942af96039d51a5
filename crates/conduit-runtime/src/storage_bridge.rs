//! Adapters wiring `conduit-storage`'s concrete stores into the trait seams
//! [`conduit_llm::router::CredentialSource`] and [`crate::prompt_stack::PromptSource`]
//! declare, so a caller can hand a real `Arc<CredentialStore>`/`Arc<PromptStore>`
//! to [`conduit_llm::router::ProviderRouter`] and [`crate::prompt_stack::PromptStack`]
//! without either of those crates depending on `conduit-storage` directly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_core::error::{AppError, AppResult};
use conduit_core::types::{AuthType, SavedAuthentication, SystemPromptItem};
use conduit_llm::router::CredentialSource;
use conduit_storage::{CredentialPatch, CredentialStore, PromptStore, StorageError};
use serde_json::Value;
use uuid::Uuid;

use crate::prompt_stack::PromptSource;

fn app_err(e: StorageError) -> AppError {
    match e {
        StorageError::NotFound(msg) => AppError::SessionNotFound(msg),
        StorageError::UniquenessViolation(msg) => AppError::UniquenessViolation(msg),
        StorageError::InvalidKey(msg) => AppError::InvalidCredentials(msg),
        other => AppError::StorageError(other.to_string()),
    }
}

/// Adapts [`CredentialStore`] to the [`CredentialSource`] seam.
#[derive(Debug, Clone)]
pub struct StorageCredentials(pub Arc<CredentialStore>);

#[async_trait]
impl CredentialSource for StorageCredentials {
    async fn create_named(
        &self,
        provider: &str,
        auth_type: AuthType,
        name: &str,
        credentials: HashMap<String, Value>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<SavedAuthentication> {
        self.0.create_named(provider, auth_type, name, credentials, expires_at).await.map_err(app_err)
    }

    async fn get(&self, provider: &str, auth_type: AuthType, name: &str) -> AppResult<Option<SavedAuthentication>> {
        self.0.get(provider, auth_type, name).await.map_err(app_err)
    }

    async fn delete(&self, provider: &str, auth_type: AuthType, name: &str) -> AppResult<()> {
        self.0.delete(provider, auth_type, name).await.map_err(app_err)
    }

    async fn update(
        &self,
        provider: &str,
        auth_type: AuthType,
        name: &str,
        credentials: HashMap<String, Value>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<SavedAuthentication> {
        let patch = CredentialPatch { credentials: Some(credentials), expires_at: Some(expires_at) };
        self.0.update(provider, auth_type, name, patch).await.map_err(app_err)
    }
}

/// Adapts [`PromptStore`] to the [`PromptSource`] seam.
#[derive(Debug, Clone)]
pub struct StoragePrompts(pub Arc<PromptStore>);

#[async_trait]
impl PromptSource for StoragePrompts {
    async fn get_item(&self, id: Uuid) -> AppResult<Option<SystemPromptItem>> {
        self.0.get(id).await.map_err(app_err)
    }

    async fn defaults_for_provider(&self, provider: &str) -> AppResult<Vec<SystemPromptItem>> {
        self.0.defaults_for_provider(provider).await.map_err(app_err)
    }
}
