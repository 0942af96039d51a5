//! `conduit doctor` — basic health checks: process configuration loads,
//! the embedded database is reachable, and `mcp_settings.json` (if present)
//! parses.

use anyhow::Result;

/// Run `conduit doctor`.
pub async fn run() -> Result<()> {
    println!("conduit doctor");
    println!();

    print!("  configuration... ");
    let workspace_root = std::env::current_dir().ok();
    match conduit_config::Config::load(workspace_root.as_deref()) {
        Ok(resolved) => {
            println!("ok");
            println!(
                "    storage: {}  max_tool_rounds: {}",
                resolved.config.storage.path.display(),
                resolved.config.runtime.max_tool_rounds
            );
        },
        Err(e) => println!("warn: using defaults ({e})"),
    }

    print!("  embedded storage... ");
    match conduit_storage::Database::connect_memory().await {
        Ok(_) => println!("ok"),
        Err(e) => println!("fail: {e}"),
    }

    print!("  mcp_settings.json... ");
    match conduit_mcp::McpSettings::load_default() {
        Ok(settings) => println!("ok ({} server(s) configured)", settings.list().len()),
        Err(e) => println!("warn: {e}"),
    }

    Ok(())
}
