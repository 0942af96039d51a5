//! Shell tool — executes shell commands with a persistent, workspace-confined
//! working directory. Named `shell` per §4.6.

use std::path::PathBuf;

use serde_json::{Value, json};
use tokio::process::Command;

use crate::{BuiltinTool, ToolContext, ToolError, ToolResult};

/// Default timeout in milliseconds (2 minutes).
const DEFAULT_TIMEOUT_MS: u64 = 120_000;
/// Maximum timeout in milliseconds (10 minutes).
const MAX_TIMEOUT_MS: u64 = 600_000;
/// Sentinel used to extract the post-command working directory.
const CWD_SENTINEL: &str = "__CONDUIT_CWD__";

/// Built-in tool for executing shell commands.
pub struct ShellTool;

#[async_trait::async_trait]
impl BuiltinTool for ShellTool {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn description(&self) -> &'static str {
        "Executes a shell command. The working directory persists between \
         invocations and is confined to the session workspace. Optional \
         timeout in milliseconds (max 600000)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (default: 120000, max: 600000)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("command is required".into()))?;

        let timeout_ms = args
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .min(MAX_TIMEOUT_MS);

        let cwd = ctx.cwd.read().await.clone();
        tracing::debug!(command, timeout_ms, cwd = %cwd.display(), "executing shell command");

        let wrapped = format!(
            "{command}\n__CONDUIT_EXIT__=$?\necho \"{CWD_SENTINEL}\"\npwd\nexit $__CONDUIT_EXIT__"
        );

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            run_shell(&wrapped, &cwd),
        )
        .await;

        match result {
            Ok(Ok((stdout, stderr, exit_code))) => {
                let (output, new_cwd) = parse_sentinel_output(&stdout);

                if let Some(new_cwd) = new_cwd {
                    // Never let the sentinel pwd move cwd outside the workspace.
                    if new_cwd.starts_with(&ctx.workspace_root) {
                        *ctx.cwd.write().await = new_cwd;
                    }
                }

                Ok(json!({
                    "output": format!("{output}{}", if stderr.is_empty() { String::new() } else { format!("\nSTDERR:\n{stderr}") }),
                    "metadata": {"exit_code": exit_code},
                })
                .to_string())
            }
            Ok(Err(e)) => Err(ToolError::ExecutionFailed(e.to_string())),
            Err(_) => Err(ToolError::Timeout(timeout_ms)),
        }
    }
}

async fn run_shell(command: &str, cwd: &std::path::Path) -> std::io::Result<(String, String, i32)> {
    let output = Command::new("bash")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    Ok((stdout, stderr, exit_code))
}

fn parse_sentinel_output(stdout: &str) -> (String, Option<PathBuf>) {
    if let Some(sentinel_pos) = stdout.find(CWD_SENTINEL) {
        let output = stdout[..sentinel_pos].trim_end().to_string();
        #[allow(clippy::arithmetic_side_effects)]
        let after_sentinel = &stdout[sentinel_pos + CWD_SENTINEL.len()..];
        let new_cwd = after_sentinel
            .lines()
            .find(|l| !l.is_empty())
            .map(|l| PathBuf::from(l.trim()));
        (output, new_cwd)
    } else {
        (stdout.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_root(root: &std::path::Path) -> ToolContext {
        ToolContext::new(root.to_path_buf())
    }

    #[tokio::test]
    async fn echo_is_captured_in_output_field() {
        let ctx = ctx_with_root(&std::env::temp_dir());
        let result = ShellTool
            .execute(serde_json::json!({"command": "echo hello"}), &ctx)
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert!(parsed["output"].as_str().unwrap().contains("hello"));
        assert_eq!(parsed["metadata"]["exit_code"], 0);
    }

    #[tokio::test]
    async fn nonzero_exit_code_is_reported() {
        let ctx = ctx_with_root(&std::env::temp_dir());
        let result = ShellTool
            .execute(serde_json::json!({"command": "exit 42"}), &ctx)
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["metadata"]["exit_code"], 42);
    }

    #[tokio::test]
    async fn cwd_persists_within_workspace() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = ctx_with_root(dir.path());
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        ShellTool
            .execute(serde_json::json!({"command": "cd subdir"}), &ctx)
            .await
            .unwrap();

        let cwd = ctx.cwd.read().await.clone();
        assert!(cwd.ends_with("subdir"));
    }

    #[tokio::test]
    async fn timeout_is_enforced() {
        let ctx = ctx_with_root(&std::env::temp_dir());
        let result = ShellTool
            .execute(serde_json::json!({"command": "sleep 10", "timeout": 100}), &ctx)
            .await;
        assert!(matches!(result, Err(ToolError::Timeout(100))));
    }
}
