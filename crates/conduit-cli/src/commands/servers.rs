//! `conduit servers` — read-only view of `mcp_settings.json` (§6.2). Listing
//! live connection status would require a running daemon process, which is
//! out of this crate's scope (§1 Out of scope); this only reports what is
//! *configured*.

use anyhow::{Context as _, Result};

use crate::formatter::OutputFormat;

/// Arguments for `conduit servers`.
#[derive(Debug, clap::Args)]
pub struct ServersArgs {
    /// Path to `mcp_settings.json`. Defaults to the standard lookup path.
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
}

/// Run `conduit servers`.
pub fn run(args: ServersArgs, format: OutputFormat) -> Result<()> {
    let settings = match args.config {
        Some(path) => conduit_mcp::McpSettings::load(&path).context("loading mcp_settings.json")?,
        None => conduit_mcp::McpSettings::load_default().context("loading mcp_settings.json")?,
    };

    let servers = settings.list_by_priority();

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = servers
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "name": s.name,
                        "transport": format!("{:?}", s.transport_type),
                        "priority": s.priority,
                        "trust": if s.trust { "trusted" } else { "untrusted" },
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        },
        OutputFormat::Pretty => {
            if servers.is_empty() {
                println!("no MCP servers configured");
            }
            for s in &servers {
                println!(
                    "{:<20} {:?} priority={} trust={}",
                    s.name,
                    s.transport_type,
                    s.priority,
                    if s.trust { "trusted" } else { "untrusted" },
                );
            }
        },
    }
    Ok(())
}
