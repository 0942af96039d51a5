//! `conduit run-turn` — §4.10 `AgentLoop::run_turn`, the ReAct turn driver,
//! driven once from the command line against built-in tools only (no MCP
//! servers attached — use `conduit servers` to inspect what `mcp_settings.json`
//! would add to a real session).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use conduit_core::types::Message;
use conduit_runtime::agent_loop::{AgentLoop, TurnOptions};
use conduit_runtime::session::AgentSession;
use conduit_runtime::tool_dispatch::ToolDispatcher;
use conduit_telemetry::TracingSink;
use conduit_tools::ToolRegistry;

use crate::context::{open_router, parse_auth_type};
use crate::formatter::OutputFormat;

/// Arguments for `conduit run-turn`.
#[derive(Debug, clap::Args)]
pub struct RunTurnArgs {
    /// Provider string.
    #[arg(long)]
    pub provider: String,

    /// `api_key`, `oauth`, or `service_account`.
    #[arg(long = "auth-type", default_value = "api_key")]
    pub auth_type: String,

    /// Credential record name to authenticate with.
    #[arg(long)]
    pub name: String,

    /// Model id passed to the provider.
    #[arg(long)]
    pub model: String,

    /// The user message to send. Repeat for a multi-turn seed history;
    /// all but the last are treated as prior user turns.
    #[arg(long = "message", required = true)]
    pub messages: Vec<String>,

    /// Directory built-in file/shell tools are confined to. Defaults to
    /// the current directory.
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Built-in tool names to enable. Empty enables every built-in.
    #[arg(long = "tool")]
    pub tools: Vec<String>,

    /// Hard cap on STREAMING→TOOL_DISPATCH rounds (§4.10 step 4).
    #[arg(long, default_value = "8")]
    pub max_tool_rounds: u32,

    /// Storage file path, or `:memory:`.
    #[arg(long, default_value = ":memory:")]
    pub storage: std::path::PathBuf,
}

/// Run `conduit run-turn`.
pub async fn run(args: RunTurnArgs, format: OutputFormat) -> Result<()> {
    if args.messages.is_empty() {
        bail!("at least one --message is required");
    }
    let auth_type = parse_auth_type(&args.auth_type)?;
    let router = open_router(&args.storage).await?;

    let working_dir = match args.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("resolving current directory")?,
    };

    let mut session = AgentSession::new(args.provider, auth_type, args.name, args.model, working_dir)
        .with_tools(args.tools);
    for text in &args.messages {
        session.push_message(Message::user(text.clone()));
    }

    let dispatcher = Arc::new(ToolDispatcher::new(Arc::new(ToolRegistry::with_defaults()), None));
    let agent_loop = AgentLoop::new(router, dispatcher);
    let telemetry = TracingSink;
    let opts = TurnOptions { max_tool_rounds: args.max_tool_rounds, ..TurnOptions::default() };

    // No pinned system-prompt stack for a one-shot CLI turn; a real caller
    // resolves one via `conduit_runtime::prompt_stack::PromptStack` first.
    match agent_loop.run_turn(&session, "", opts, &telemetry).await {
        Ok(outcome) => {
            print_outcome(&outcome, format);
            Ok(())
        },
        Err(failure) => {
            print_failure(&failure, format);
            Err(anyhow::anyhow!(failure.error))
        },
    }
}

fn print_outcome(outcome: &conduit_runtime::agent_loop::TurnOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let tools: Vec<_> = outcome
                .tools
                .iter()
                .map(|t| serde_json::json!({"name": t.name, "args": t.args, "result": t.result}))
                .collect();
            let body = serde_json::json!({
                "final_text": outcome.final_text,
                "tools": tools,
                "usage": {
                    "prompt_tokens": outcome.usage.prompt_tokens,
                    "completion_tokens": outcome.usage.completion_tokens,
                    "total_tokens": outcome.usage.total_tokens,
                },
            });
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
        },
        OutputFormat::Pretty => {
            for t in &outcome.tools {
                println!("[tool] {} {} -> {}", t.name, t.args, t.result);
            }
            println!("{}", outcome.final_text);
            println!(
                "-- usage: prompt={} completion={} total={}",
                outcome.usage.prompt_tokens, outcome.usage.completion_tokens, outcome.usage.total_tokens
            );
        },
    }
}

fn print_failure(failure: &conduit_runtime::agent_loop::TurnFailure, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "error": failure.error.to_string(),
                "final_text": failure.final_text,
                "tools_completed": failure.tools.len(),
            });
            eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
        },
        OutputFormat::Pretty => {
            eprintln!("turn failed: {}", failure.error);
            if !failure.final_text.is_empty() {
                eprintln!("-- partial text: {}", failure.final_text);
            }
            eprintln!("-- {} tool(s) completed before failure", failure.tools.len());
        },
    }
}
