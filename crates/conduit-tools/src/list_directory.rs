//! List directory tool — lists immediate children of a directory.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde_json::Value;

use crate::workspace::ensure_in_workspace;
use crate::{BuiltinTool, ToolContext, ToolError, ToolResult};

/// Built-in tool for listing a directory's contents.
pub struct ListDirectoryTool;

#[async_trait::async_trait]
impl BuiltinTool for ListDirectoryTool {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "Lists the immediate files and subdirectories of a directory, \
         confined to the session workspace."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (defaults to the workspace root)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let requested = args
            .get("path")
            .and_then(Value::as_str)
            .map_or_else(|| ctx.workspace_root.clone(), PathBuf::from);

        let path = ensure_in_workspace(&ctx.workspace_root, &requested)?;

        if !path.exists() {
            return Err(ToolError::PathNotFound(path.display().to_string()));
        }
        if !path.is_dir() {
            return Err(ToolError::InvalidArguments(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut names: Vec<(String, bool)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            names.push((name, file_type.is_dir()));
        }
        names.sort();

        if names.is_empty() {
            return Ok("(empty directory)".to_string());
        }

        let mut output = String::new();
        for (name, is_dir) in &names {
            let suffix = if *is_dir { "/" } else { "" };
            let _ = writeln!(output, "{name}{suffix}");
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
    async fn lists_files_and_dirs_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("a_dir")).unwrap();

        let ctx = ctx_with_root(dir.path());
        let result = ListDirectoryTool.execute(serde_json::json!({}), &ctx).await.unwrap();
        assert!(result.contains("a_dir/"));
        assert!(result.contains("b.txt"));
        assert!(result.find("a_dir").unwrap() < result.find("b.txt").unwrap());
    }

    #[tokio::test]
    async fn rejects_paths_outside_workspace() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_with_root(dir.path());
        let result = ListDirectoryTool
            .execute(serde_json::json!({"path": "/etc"}), &ctx)
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("outside workspace"));
    }

    #[tokio::test]
    async fn empty_directory_reports_as_such() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_with_root(dir.path());
        let result = ListDirectoryTool.execute(serde_json::json!({}), &ctx).await.unwrap();
        assert_eq!(result, "(empty directory)");
    }
}
