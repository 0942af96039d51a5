#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Built-in tools for the conduit agent runtime (C6 ToolRegistry).
//!
//! Provides built-in tools as direct Rust function calls (not MCP) for the
//! hot-path coding operations: read, write, edit, search, list, and execute.
//! [`declare`] translates these (and MCP-discovered tools) into each
//! provider's wire format; [`workspace`] enforces the workspace-boundary
//! security invariant all file/shell tools share.

mod edit_file;
mod glob;
mod grep;
mod list_directory;
mod read_file;
mod shell;
mod truncate;
mod write_file;

pub mod declare;
pub mod workspace;

pub use edit_file::EditFileTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use shell::ShellTool;
pub use truncate::truncate_at_char_boundary;
pub use write_file::WriteFileTool;

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Maximum output size in characters before truncation.
const MAX_OUTPUT_CHARS: usize = 30_000;

/// A built-in tool that executes directly in-process.
#[async_trait::async_trait]
pub trait BuiltinTool: Send + Sync {
    /// Tool name (no colons — distinguishes from MCP "server__tool" format).
    fn name(&self) -> &'static str;

    /// Human-readable description for the LLM.
    fn description(&self) -> &'static str;

    /// JSON schema for tool input parameters.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult;
}

/// Shared context available to all built-in tools.
pub struct ToolContext {
    /// Workspace root directory; every file/shell tool is confined to it.
    pub workspace_root: PathBuf,
    /// Current working directory (persists across shell invocations).
    pub cwd: Arc<RwLock<PathBuf>>,
}

impl ToolContext {
    /// Create a new tool context rooted at `workspace_root`.
    #[must_use]
    pub fn new(workspace_root: PathBuf) -> Self {
        let cwd = Arc::new(RwLock::new(workspace_root.clone()));
        Self { workspace_root, cwd }
    }

    /// Create a context that shares its `cwd` with another (e.g. a second
    /// turn in the same session continuing where the shell left off).
    #[must_use]
    pub fn with_shared_cwd(workspace_root: PathBuf, cwd: Arc<RwLock<PathBuf>>) -> Self {
        Self { workspace_root, cwd }
    }
}

/// Tool execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid arguments.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Path not found.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Timeout.
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type for tool execution.
pub type ToolResult = Result<String, ToolError>;

/// Registry of built-in tools for lookup and provider-declaration export.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn BuiltinTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with all default built-in tools registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ReadFileTool));
        registry.register(Box::new(WriteFileTool));
        registry.register(Box::new(EditFileTool));
        registry.register(Box::new(GlobTool));
        registry.register(Box::new(GrepTool));
        registry.register(Box::new(ShellTool));
        registry.register(Box::new(ListDirectoryTool));
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Box<dyn BuiltinTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn BuiltinTool> {
        self.tools.get(name).map(AsRef::as_ref)
    }

    /// Check if a name refers to a built-in tool (MCP tools are namespaced
    /// `server__tool`; see §4.8).
    #[must_use]
    pub fn is_builtin(name: &str) -> bool {
        !name.contains("__")
    }

    /// Export all registered tools as provider-neutral specs, ready for
    /// [`declare::declare_for_provider`].
    #[must_use]
    pub fn tool_specs(&self) -> Vec<declare::ToolSpec> {
        self.tools
            .values()
            .map(|t| declare::ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncate output to stay within LLM context limits.
///
/// If `output` exceeds [`MAX_OUTPUT_CHARS`], it is truncated and a notice is appended.
#[must_use]
pub fn truncate_output(output: String) -> String {
    if output.len() <= MAX_OUTPUT_CHARS {
        return output;
    }
    let mut truncated = output[..MAX_OUTPUT_CHARS].to_string();
    truncated.push_str("\n\n... (output truncated — exceeded 30000 character limit)");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_builtin() {
        assert!(ToolRegistry::is_builtin("read_file"));
        assert!(ToolRegistry::is_builtin("shell"));
        assert!(!ToolRegistry::is_builtin("filesystem__read_file"));
    }

    #[test]
    fn test_registry_with_defaults() {
        let registry = ToolRegistry::with_defaults();
        assert!(registry.get("read_file").is_some());
        assert!(registry.get("write_file").is_some());
        assert!(registry.get("edit_file").is_some());
        assert!(registry.get("glob").is_some());
        assert!(registry.get("grep").is_some());
        assert!(registry.get("shell").is_some());
        assert!(registry.get("list_directory").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_tool_specs() {
        let registry = ToolRegistry::with_defaults();
        let specs = registry.tool_specs();
        assert_eq!(specs.len(), 7);
        for spec in &specs {
            assert!(!spec.name.contains("__"));
            assert!(!spec.description.is_empty());
        }
    }

    #[test]
    fn test_truncate_output_small() {
        let small = "hello".to_string();
        assert_eq!(truncate_output(small.clone()), small);
    }

    #[test]
    fn test_truncate_output_large() {
        let large = "x".repeat(40_000);
        let result = truncate_output(large);
        assert!(result.len() < 40_000);
        assert!(result.contains("output truncated"));
    }
}
