//! Grep tool — regex content search, confined to the workspace.

use std::fmt::Write as _;
use std::path::PathBuf;

use regex::Regex;
use serde_json::Value;
use walkdir::WalkDir;

use crate::workspace::ensure_in_workspace;
use crate::{BuiltinTool, ToolContext, ToolError, ToolResult};

const MAX_MATCHES: usize = 200;

/// Built-in tool for regex content search across files.
pub struct GrepTool;

#[async_trait::async_trait]
impl BuiltinTool for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn description(&self) -> &'static str {
        "Searches file contents for a regular expression under a directory \
         (defaults to the workspace root). Returns up to 200 matching lines \
         as `path:line: text`."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (defaults to workspace root)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let pattern = args
            .get("pattern")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("pattern is required".into()))?;

        let search_dir = args
            .get("path")
            .and_then(Value::as_str)
            .map_or_else(|| ctx.workspace_root.clone(), PathBuf::from);
        let search_dir = ensure_in_workspace(&ctx.workspace_root, &search_dir)?;

        if !search_dir.exists() {
            return Err(ToolError::PathNotFound(search_dir.display().to_string()));
        }

        let regex = Regex::new(pattern)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid pattern: {e}")))?;

        let mut output = String::new();
        let mut matches = 0usize;

        'walk: for entry in WalkDir::new(&search_dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || e.file_name().to_str().is_none_or(|s| !s.starts_with('.')))
        {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue; // binary or non-UTF8, skip silently
            };
            for (idx, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    let _ = writeln!(output, "{}:{}: {}", entry.path().display(), idx.saturating_add(1), line);
                    matches = matches.saturating_add(1);
                    if matches >= MAX_MATCHES {
                        break 'walk;
                    }
                }
            }
        }

        if matches == 0 {
            return Ok(format!("No matches for \"{pattern}\""));
        }
        if matches >= MAX_MATCHES {
            output.push_str("\n(truncated at 200 matches)");
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx_with_root(root: &std::path::Path) -> ToolContext {
        ToolContext::new(root.to_path_buf())
    }

    #[tokio::test]
    async fn finds_matching_lines_with_location() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\nfn helper() {}\n").unwrap();

        let ctx = ctx_with_root(dir.path());
        let result = GrepTool
            .execute(serde_json::json!({"pattern": "fn \\w+\\(\\)"}), &ctx)
            .await
            .unwrap();
        assert!(result.contains("a.rs:1:"));
        assert!(result.contains("a.rs:2:"));
    }

    #[tokio::test]
    async fn no_matches_reported_plainly() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "hello").unwrap();
        let ctx = ctx_with_root(dir.path());
        let result = GrepTool
            .execute(serde_json::json!({"pattern": "zzz"}), &ctx)
            .await
            .unwrap();
        assert!(result.contains("No matches"));
    }

    #[tokio::test]
    async fn invalid_regex_is_an_error() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_with_root(dir.path());
        let result = GrepTool
            .execute(serde_json::json!({"pattern": "(unclosed"}), &ctx)
            .await;
        assert!(result.is_err());
    }
}
