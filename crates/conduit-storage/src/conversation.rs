//! C11 — `ConversationStore` (§4.11): append canonical chat entries per
//! thread, attach orphaned threads to sessions, and read back a thread's
//! history in `turn_index` order.

use conduit_core::types::{Actor, ChatEntry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StorageError, StorageResult};

const TABLE: &str = "chat_entries";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatRow {
    id: Uuid,
    session_id: Option<Uuid>,
    thread_id: Uuid,
    turn_index: u32,
    actor: Actor,
    combined_chat: Value,
    inserted_at: chrono::DateTime<Utc>,
}

impl From<ChatRow> for ChatEntry {
    fn from(row: ChatRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            thread_id: row.thread_id,
            turn_index: row.turn_index,
            actor: row.actor,
            combined_chat: row.combined_chat,
            inserted_at: row.inserted_at,
        }
    }
}

/// C11 `ConversationStore` (§4.11).
#[derive(Debug, Clone)]
pub struct ConversationStore {
    db: std::sync::Arc<Database>,
}

impl ConversationStore {
    /// Wrap an existing database connection.
    #[must_use]
    pub fn new(db: std::sync::Arc<Database>) -> Self {
        Self { db }
    }

    /// Every entry in `thread_id`, ordered by `turn_index`.
    async fn thread_entries(&self, thread_id: Uuid) -> StorageResult<Vec<ChatRow>> {
        let mut rows: Vec<ChatRow> = self
            .db
            .client()
            .query("SELECT * FROM type::table($table) WHERE thread_id = $thread_id")
            .bind(("table", TABLE))
            .bind(("thread_id", thread_id))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        rows.sort_by_key(|r| r.turn_index);
        Ok(rows)
    }

    /// Append one entry. `turn_index` is computed as `max(existing) + 1`
    /// (0 for the first entry in a thread).
    pub async fn append_entry(
        &self,
        session_id: Option<Uuid>,
        thread_id: Uuid,
        actor: Actor,
        combined_chat: Value,
    ) -> StorageResult<ChatEntry> {
        let existing = self.thread_entries(thread_id).await?;
        let turn_index = existing.last().map_or(0, |e| e.turn_index.saturating_add(1));

        let row = ChatRow {
            id: Uuid::new_v4(),
            session_id,
            thread_id,
            turn_index,
            actor,
            combined_chat,
            inserted_at: Utc::now(),
        };

        let created: Option<ChatRow> = self
            .db
            .client()
            .create((TABLE, row.id.to_string()))
            .content(row)
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        created
            .map(Into::into)
            .ok_or_else(|| StorageError::Internal("append returned no row".into()))
    }

    /// The latest thread's entries for a session, ordered by `turn_index`.
    /// "Latest" means the thread with the most recently inserted entry.
    pub async fn latest_thread(&self, session_id: Uuid) -> StorageResult<Vec<ChatEntry>> {
        let mut rows: Vec<ChatRow> = self
            .db
            .client()
            .query("SELECT * FROM type::table($table) WHERE session_id = $session_id")
            .bind(("table", TABLE))
            .bind(("session_id", session_id))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        let Some(latest_thread_id) = rows.iter().max_by_key(|r| r.inserted_at).map(|r| r.thread_id)
        else {
            return Ok(Vec::new());
        };

        rows.retain(|r| r.thread_id == latest_thread_id);
        rows.sort_by_key(|r| r.turn_index);
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Attach an orphaned thread (`session_id = NULL`) to a session.
    /// Returns the number of entries updated.
    pub async fn attach_thread_to_session(
        &self,
        thread_id: Uuid,
        session_id: Uuid,
    ) -> StorageResult<usize> {
        let rows = self.thread_entries(thread_id).await?;
        let mut count = 0usize;
        for row in rows {
            if row.session_id.is_some() {
                continue;
            }
            let mut updated = row;
            updated.session_id = Some(session_id);
            let _: Option<ChatRow> = self
                .db
                .client()
                .update((TABLE, updated.id.to_string()))
                .content(updated)
                .await
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }

    /// Nullify `session_id` on every entry belonging to `session_id`,
    /// preserving the entries themselves (deleting a [`conduit_core::types::Session`]
    /// must not cascade, per §3.2/§6.1).
    pub async fn delete_session_only(&self, session_id: Uuid) -> StorageResult<usize> {
        let mut rows: Vec<ChatRow> = self
            .db
            .client()
            .query("SELECT * FROM type::table($table) WHERE session_id = $session_id")
            .bind(("table", TABLE))
            .bind(("session_id", session_id))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        let count = rows.len();
        for row in rows.drain(..) {
            let mut updated = row;
            updated.session_id = None;
            let _: Option<ChatRow> = self
                .db
                .client()
                .update((TABLE, updated.id.to_string()))
                .content(updated)
                .await
                .map_err(|e| StorageError::Internal(e.to_string()))?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn store() -> ConversationStore {
        let db = Database::connect_memory().await.unwrap();
        ConversationStore::new(Arc::new(db))
    }

    #[tokio::test]
    async fn turn_index_is_contiguous_from_zero() {
        let store = store().await;
        let thread = Uuid::new_v4();
        let session = Uuid::new_v4();

        let e0 = store
            .append_entry(Some(session), thread, Actor::User, serde_json::json!({"messages": []}))
            .await
            .unwrap();
        let e1 = store
            .append_entry(Some(session), thread, Actor::Assistant, serde_json::json!({"messages": []}))
            .await
            .unwrap();

        assert_eq!(e0.turn_index, 0);
        assert_eq!(e1.turn_index, 1);
    }

    #[tokio::test]
    async fn orphaned_thread_can_be_attached_later() {
        let store = store().await;
        let thread = Uuid::new_v4();
        store
            .append_entry(None, thread, Actor::User, serde_json::json!({"messages": []}))
            .await
            .unwrap();

        let session = Uuid::new_v4();
        let count = store.attach_thread_to_session(thread, session).await.unwrap();
        assert_eq!(count, 1);

        let entries = store.latest_thread(session).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn delete_session_nulls_session_id_without_removing_entries() {
        let store = store().await;
        let thread = Uuid::new_v4();
        let session = Uuid::new_v4();
        store
            .append_entry(Some(session), thread, Actor::User, serde_json::json!({"messages": []}))
            .await
            .unwrap();

        let count = store.delete_session_only(session).await.unwrap();
        assert_eq!(count, 1);

        let entries = store.thread_entries(thread).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].session_id.is_none());
    }
}
