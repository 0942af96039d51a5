//! `conduit list-models` — §4.9 `ProviderRouter::list_models`.

use anyhow::{Context as _, Result};

use crate::context::{open_router, parse_auth_type};
use crate::formatter::OutputFormat;

/// Arguments for `conduit list-models`.
#[derive(Debug, clap::Args)]
pub struct ListModelsArgs {
    /// Provider string.
    #[arg(long)]
    pub provider: String,

    /// `api_key`, `oauth`, or `service_account`.
    #[arg(long = "auth-type", default_value = "api_key")]
    pub auth_type: String,

    /// Credential record name to authenticate with.
    #[arg(long)]
    pub name: String,

    /// Storage file path, or `:memory:`.
    #[arg(long, default_value = ":memory:")]
    pub storage: std::path::PathBuf,
}

/// Run `conduit list-models`.
pub async fn run(args: ListModelsArgs, format: OutputFormat) -> Result<()> {
    let auth_type = parse_auth_type(&args.auth_type)?;
    let router = open_router(&args.storage).await?;
    let models = router
        .list_models(&args.provider, auth_type, &args.name)
        .await
        .context("list_models failed")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&models)?);
        },
        OutputFormat::Pretty => {
            for model in &models {
                let caps = if model.capabilities.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", model.capabilities.join(", "))
                };
                println!("{:<30} {}{caps}", model.id, model.name);
            }
        },
    }
    Ok(())
}
