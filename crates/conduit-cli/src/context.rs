//! Shared plumbing every subcommand needs: open the storage backend,
//! build a [`ProviderRouter`] over it, and parse the `(provider, auth_type)`
//! pair every caller-API operation takes.

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use conduit_core::types::AuthType;
use conduit_llm::router::ProviderRouter;
use conduit_runtime::storage_bridge::StorageCredentials;
use conduit_storage::{CredentialStore, Database};

/// Parse a `--auth-type` flag value into [`AuthType`].
pub fn parse_auth_type(raw: &str) -> Result<AuthType> {
    match raw {
        "api_key" | "api-key" => Ok(AuthType::ApiKey),
        "oauth" => Ok(AuthType::OAuth),
        "service_account" | "service-account" => Ok(AuthType::ServiceAccount),
        other => bail!("unknown auth type {other:?} (expected api_key, oauth, or service_account)"),
    }
}

/// Open the configured embedded database and build a [`ProviderRouter`]
/// over a [`CredentialStore`] on top of it.
///
/// `storage_path` of `":memory:"` connects to an ephemeral in-memory
/// database (§10.3 `StorageSection` default) — fine for `list-models`/
/// `run-turn` one-shots but credentials created this way don't survive
/// past the process.
pub async fn open_router(storage_path: &std::path::Path) -> Result<Arc<ProviderRouter<StorageCredentials>>> {
    let db = if storage_path.as_os_str() == ":memory:" {
        Database::connect_memory().await.context("connecting to in-memory storage")?
    } else {
        let path = storage_path.to_string_lossy();
        Database::connect_embedded(&path).await.context("connecting to embedded storage")?
    };
    let credentials = StorageCredentials(Arc::new(CredentialStore::new(Arc::new(db))));
    let router = ProviderRouter::new(credentials).context("building provider router")?;
    Ok(Arc::new(router))
}
