//! `conduit create-session` — §4.9 `ProviderRouter::create_session`.

use anyhow::{Context as _, Result};
use conduit_llm::router::CreateSessionOptions;

use crate::context::{open_router, parse_auth_type};

/// Arguments for `conduit create-session`.
#[derive(Debug, clap::Args)]
pub struct CreateSessionArgs {
    /// Provider string (`openai`, `anthropic`, `gemini`).
    #[arg(long)]
    pub provider: String,

    /// `api_key`, `oauth`, or `service_account`.
    #[arg(long = "auth-type", default_value = "api_key")]
    pub auth_type: String,

    /// Credential record name (max 50 chars).
    #[arg(long)]
    pub name: String,

    /// Plain API key (required for `api_key`).
    #[arg(long, env = "CONDUIT_API_KEY")]
    pub api_key: Option<String>,

    /// OAuth authorization code (required for `oauth`).
    #[arg(long)]
    pub authorization_code: Option<String>,

    /// PKCE code verifier paired with `--authorization-code`.
    #[arg(long)]
    pub code_verifier: Option<String>,

    /// Storage file path, or `:memory:` for an ephemeral store.
    #[arg(long, default_value = ":memory:")]
    pub storage: std::path::PathBuf,
}

/// Run `conduit create-session`.
pub async fn run(args: CreateSessionArgs) -> Result<()> {
    let auth_type = parse_auth_type(&args.auth_type)?;
    let router = open_router(&args.storage).await?;

    let opts = CreateSessionOptions {
        name: args.name,
        api_key: args.api_key,
        authorization_code: args.authorization_code,
        code_verifier: args.code_verifier,
    };

    let record = router
        .create_session(&args.provider, auth_type, opts)
        .await
        .context("create_session failed")?;

    println!(
        "created {} credential {:?} for provider {:?} (auth_type={:?})",
        if record.expires_at.is_some() { "oauth" } else { "api_key" },
        record.name,
        record.provider,
        record.auth_type,
    );
    Ok(())
}
