//! `conduit delete-session` — §4.9 `ProviderRouter::delete_session`.
//! Idempotent: deleting an absent record is not an error.

use anyhow::{Context as _, Result};

use crate::context::{open_router, parse_auth_type};

/// Arguments for `conduit delete-session`.
#[derive(Debug, clap::Args)]
pub struct DeleteSessionArgs {
    /// Provider string.
    #[arg(long)]
    pub provider: String,

    /// `api_key`, `oauth`, or `service_account`.
    #[arg(long = "auth-type", default_value = "api_key")]
    pub auth_type: String,

    /// Credential record name.
    #[arg(long)]
    pub name: String,

    /// Storage file path, or `:memory:`.
    #[arg(long, default_value = ":memory:")]
    pub storage: std::path::PathBuf,
}

/// Run `conduit delete-session`.
pub async fn run(args: DeleteSessionArgs) -> Result<()> {
    let auth_type = parse_auth_type(&args.auth_type)?;
    let router = open_router(&args.storage).await?;
    router
        .delete_session(&args.provider, auth_type, &args.name)
        .await
        .context("delete_session failed")?;
    println!("deleted {:?} ({:?}/{:?})", args.name, args.provider, auth_type);
    Ok(())
}
