//! `PromptStore` — persistence for `supplied_context_items` (§6.1), the
//! versioned system-prompt lineage [`crate::prompts`]'s caller
//! ([`conduit_runtime::prompt_stack::PromptStack`]) resolves against.
//!
//! Grounded on the same row/public-type split as [`crate::conversation`]
//! and [`crate::credentials`]: each revision is immutable once created, so
//! `create_revision` always inserts a new record rather than updating one.

use conduit_core::types::SystemPromptItem;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StorageError, StorageResult};

const TABLE: &str = "supplied_context_items";

/// C5-supporting prompt item store.
#[derive(Debug, Clone)]
pub struct PromptStore {
    db: std::sync::Arc<Database>,
}

impl PromptStore {
    /// Wrap an existing database connection.
    #[must_use]
    pub fn new(db: std::sync::Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new, immutable revision.
    pub async fn create_revision(&self, item: SystemPromptItem) -> StorageResult<SystemPromptItem> {
        let id = item.id;
        let created: Option<SystemPromptItem> = self
            .db
            .client()
            .create((TABLE, id.to_string()))
            .content(item)
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        created.ok_or_else(|| StorageError::Internal("create returned no row".into()))
    }

    /// Fetch one revision by id.
    pub async fn get(&self, id: Uuid) -> StorageResult<Option<SystemPromptItem>> {
        self.db
            .client()
            .select((TABLE, id.to_string()))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))
    }

    /// Every `is_default = true` revision whose `provider` is `provider` or
    /// `"shared"`, in no particular order (ordering is the caller's concern).
    pub async fn defaults_for_provider(&self, provider: &str) -> StorageResult<Vec<SystemPromptItem>> {
        let rows: Vec<SystemPromptItem> = self
            .db
            .client()
            .query("SELECT * FROM type::table($table) WHERE is_default = true AND (provider = $provider OR provider = 'shared')")
            .bind(("table", TABLE))
            .bind(("provider", provider.to_string()))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::types::PromptRenderFormat;
    use std::sync::Arc;

    async fn store() -> PromptStore {
        let db = Database::connect_memory().await.unwrap();
        PromptStore::new(Arc::new(db))
    }

    fn item(provider: &str, is_default: bool, text: &str) -> SystemPromptItem {
        SystemPromptItem {
            id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            provider: provider.to_string(),
            render_format: PromptRenderFormat::Text,
            version: 1,
            is_default,
            text: text.to_string(),
            metadata: serde_json::Value::Null,
            editor: None,
            change_note: None,
            inserted_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = store().await;
        let created = store.create_revision(item("openai", true, "hello")).await.unwrap();
        let fetched = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.text, "hello");
    }

    #[tokio::test]
    async fn defaults_for_provider_includes_shared_items() {
        let store = store().await;
        store.create_revision(item("openai", true, "openai default")).await.unwrap();
        store.create_revision(item("shared", true, "shared default")).await.unwrap();
        store.create_revision(item("anthropic", true, "anthropic default")).await.unwrap();

        let defaults = store.defaults_for_provider("openai").await.unwrap();
        assert_eq!(defaults.len(), 2);
    }

    #[tokio::test]
    async fn non_default_items_are_excluded() {
        let store = store().await;
        store.create_revision(item("openai", false, "draft")).await.unwrap();
        let defaults = store.defaults_for_provider("openai").await.unwrap();
        assert!(defaults.is_empty());
    }
}
