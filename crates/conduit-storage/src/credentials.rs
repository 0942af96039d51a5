//! C1 — `CredentialStore` (§4.1): persist and fetch
//! `(provider, auth_type, name) → SavedAuthentication` records.
//!
//! Grounded on [`crate::db::Database`]'s `SurrealDB` wrapper. Each record's
//! composite key is encoded as a single record id so a duplicate
//! `create_named` surfaces naturally as a `SurrealDB` "already exists"
//! error, which this module turns into [`StorageError::UniquenessViolation`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use conduit_core::types::{AuthType, SavedAuthentication};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::Database;
use crate::error::{StorageError, StorageResult};

const TABLE: &str = "saved_authentications";

fn record_key(provider: &str, auth_type: AuthType, name: &str) -> String {
    let auth = match auth_type {
        AuthType::ApiKey => "api_key",
        AuthType::OAuth => "oauth",
        AuthType::ServiceAccount => "service_account",
    };
    // Record ids in SurrealQL are most portable as plain identifiers;
    // sanitize by replacing anything that isn't alnum/`_`/`-`.
    let sanitize = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect()
    };
    format!("{}__{}__{}", sanitize(provider), auth, sanitize(name))
}

/// On-wire row shape stored in `saved_authentications`. Mirrors
/// [`SavedAuthentication`] but keeps `credentials` as a flat JSON map
/// (`SurrealDB` stores it as an object either way).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthRow {
    provider: String,
    auth_type: AuthType,
    name: String,
    credentials: HashMap<String, Value>,
    expires_at: Option<DateTime<Utc>>,
    inserted_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AuthRow> for SavedAuthentication {
    fn from(row: AuthRow) -> Self {
        Self {
            provider: row.provider,
            auth_type: row.auth_type,
            name: row.name,
            credentials: row.credentials,
            expires_at: row.expires_at,
            inserted_at: row.inserted_at,
            updated_at: row.updated_at,
        }
    }
}

/// A patch applied by [`CredentialStore::update`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct CredentialPatch {
    /// Replace the credential map, if set.
    pub credentials: Option<HashMap<String, Value>>,
    /// Replace the expiry, if set. `Some(None)` clears it.
    #[serde(skip)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// C1 `CredentialStore` (§4.1).
#[derive(Debug, Clone)]
pub struct CredentialStore {
    db: std::sync::Arc<Database>,
}

impl CredentialStore {
    /// Wrap an existing database connection.
    #[must_use]
    pub fn new(db: std::sync::Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a new credential record.
    ///
    /// # Errors
    ///
    /// - [`StorageError::InvalidKey`] if `auth_type == oauth` and
    ///   `expires_at` is `None`, or if `auth_type != oauth` and `expires_at`
    ///   is `Some`.
    /// - [`StorageError::UniquenessViolation`] if `(provider, auth_type, name)`
    ///   already exists.
    pub async fn create_named(
        &self,
        provider: &str,
        auth_type: AuthType,
        name: &str,
        credentials: HashMap<String, Value>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StorageResult<SavedAuthentication> {
        match (auth_type, expires_at) {
            (AuthType::OAuth, None) => {
                return Err(StorageError::InvalidKey(
                    "oauth credentials require expires_at".into(),
                ));
            }
            (AuthType::ApiKey, Some(_)) => {
                return Err(StorageError::InvalidKey(
                    "api_key credentials must not set expires_at".into(),
                ));
            }
            _ => {}
        }

        let now = Utc::now();
        let row = AuthRow {
            provider: provider.to_string(),
            auth_type,
            name: name.to_string(),
            credentials,
            expires_at,
            inserted_at: now,
            updated_at: now,
        };

        let key = record_key(provider, auth_type, name);
        let existing: Option<AuthRow> = self
            .db
            .client()
            .select((TABLE, key.as_str()))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        if existing.is_some() {
            return Err(StorageError::UniquenessViolation(format!(
                "{provider}/{auth_type:?}/{name}"
            )));
        }

        let created: Option<AuthRow> = self
            .db
            .client()
            .create((TABLE, key.as_str()))
            .content(row)
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        created
            .map(Into::into)
            .ok_or_else(|| StorageError::Internal("create returned no row".into()))
    }

    /// Fetch a record by its composite key.
    pub async fn get(
        &self,
        provider: &str,
        auth_type: AuthType,
        name: &str,
    ) -> StorageResult<Option<SavedAuthentication>> {
        let key = record_key(provider, auth_type, name);
        let row: Option<AuthRow> = self
            .db
            .client()
            .select((TABLE, key.as_str()))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(row.map(Into::into))
    }

    /// List every stored credential record.
    pub async fn list(&self) -> StorageResult<Vec<SavedAuthentication>> {
        let rows: Vec<AuthRow> = self
            .db
            .client()
            .select(TABLE)
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Apply a patch to an existing record.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] if the record doesn't exist.
    pub async fn update(
        &self,
        provider: &str,
        auth_type: AuthType,
        name: &str,
        patch: CredentialPatch,
    ) -> StorageResult<SavedAuthentication> {
        let key = record_key(provider, auth_type, name);
        let existing: Option<AuthRow> = self
            .db
            .client()
            .select((TABLE, key.as_str()))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let mut row = existing.ok_or_else(|| {
            StorageError::NotFound(format!("{provider}/{auth_type:?}/{name}"))
        })?;

        if let Some(creds) = patch.credentials {
            row.credentials = creds;
        }
        if let Some(expiry) = patch.expires_at {
            row.expires_at = expiry;
        }
        row.updated_at = Utc::now();

        let updated: Option<AuthRow> = self
            .db
            .client()
            .update((TABLE, key.as_str()))
            .content(row)
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        updated
            .map(Into::into)
            .ok_or_else(|| StorageError::Internal("update returned no row".into()))
    }

    /// Delete a record. Idempotent: deleting an absent key is not an error.
    pub async fn delete(
        &self,
        provider: &str,
        auth_type: AuthType,
        name: &str,
    ) -> StorageResult<()> {
        let key = record_key(provider, auth_type, name);
        let _: Option<AuthRow> = self
            .db
            .client()
            .delete((TABLE, key.as_str()))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(())
    }

    /// List OAuth credentials whose `expires_at` falls within `window` from
    /// now (used by [C12 `TokenRefreshWorker`](../conduit_runtime)).
    pub async fn list_oauth_expiring_within(
        &self,
        window: Duration,
    ) -> StorageResult<Vec<SavedAuthentication>> {
        let cutoff = Utc::now() + window;
        let all = self.list().await?;
        Ok(all
            .into_iter()
            .filter(|rec| {
                rec.auth_type == AuthType::OAuth
                    && rec.expires_at.is_some_and(|e| e <= cutoff)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn store() -> CredentialStore {
        let db = Database::connect_memory().await.unwrap();
        CredentialStore::new(Arc::new(db))
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = store().await;
        let mut creds = HashMap::new();
        creds.insert("api_key".to_string(), Value::String("sk-x".into()));

        let created = store
            .create_named("openai", AuthType::ApiKey, "default", creds, None)
            .await
            .unwrap();
        assert_eq!(created.provider, "openai");

        let fetched = store
            .get("openai", AuthType::ApiKey, "default")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.name, "default");
    }

    #[tokio::test]
    async fn duplicate_create_is_a_uniqueness_violation() {
        let store = store().await;
        store
            .create_named("openai", AuthType::ApiKey, "default", HashMap::new(), None)
            .await
            .unwrap();

        let result = store
            .create_named("openai", AuthType::ApiKey, "default", HashMap::new(), None)
            .await;
        assert!(matches!(result, Err(StorageError::UniquenessViolation(_))));
    }

    #[tokio::test]
    async fn oauth_requires_expiry() {
        let store = store().await;
        let result = store
            .create_named("anthropic", AuthType::OAuth, "default", HashMap::new(), None)
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = store().await;
        store
            .create_named("openai", AuthType::ApiKey, "default", HashMap::new(), None)
            .await
            .unwrap();

        store.delete("openai", AuthType::ApiKey, "default").await.unwrap();
        // second delete of an absent key must not error
        store.delete("openai", AuthType::ApiKey, "default").await.unwrap();

        assert!(store
            .get("openai", AuthType::ApiKey, "default")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn expiring_within_window_filters_correctly() {
        let store = store().await;
        let mut creds = HashMap::new();
        creds.insert("refresh_token".to_string(), Value::String("r".into()));
        store
            .create_named(
                "anthropic",
                AuthType::OAuth,
                "soon",
                creds.clone(),
                Some(Utc::now() + Duration::minutes(3)),
            )
            .await
            .unwrap();
        store
            .create_named(
                "anthropic",
                AuthType::OAuth,
                "later",
                creds,
                Some(Utc::now() + Duration::hours(10)),
            )
            .await
            .unwrap();

        let expiring = store
            .list_oauth_expiring_within(Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].name, "soon");
    }
}
