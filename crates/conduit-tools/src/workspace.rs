//! Workspace boundary enforcement for built-in file/shell tools (§4.6
//! Security): every path a built-in tool touches must resolve inside the
//! session's `working_dir`, and files read/written are capped in size.

use std::path::{Path, PathBuf};

use crate::ToolError;

/// Exact error text §4.6 specifies for an out-of-bounds path.
pub const OUTSIDE_WORKSPACE_MSG: &str = "requested path outside workspace";

/// Maximum file size a built-in tool will read or write, in bytes (10 MiB).
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Resolve `candidate` against `root` (if relative) and verify the result
/// stays within `root`. Uses lexical normalization rather than
/// `canonicalize` so the check also works for paths that don't exist yet
/// (e.g. a file `write_file` is about to create).
///
/// # Errors
///
/// [`ToolError::InvalidArguments`] with [`OUTSIDE_WORKSPACE_MSG`] if the
/// normalized path escapes `root`.
pub fn ensure_in_workspace(root: &Path, candidate: &Path) -> Result<PathBuf, ToolError> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let normalized = normalize_lexically(&joined);
    let normalized_root = normalize_lexically(root);

    if normalized.starts_with(&normalized_root) {
        Ok(normalized)
    } else {
        Err(ToolError::InvalidArguments(OUTSIDE_WORKSPACE_MSG.to_string()))
    }
}

/// Purely lexical `.`/`..` resolution (no filesystem access), so a path
/// under a not-yet-created directory can still be checked.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Check a file's size against [`MAX_FILE_SIZE_BYTES`] before reading it
/// into memory.
///
/// # Errors
///
/// [`ToolError::InvalidArguments`] if the file exceeds the limit.
pub fn ensure_within_size_limit(len: u64, path: &Path) -> Result<(), ToolError> {
    if len > MAX_FILE_SIZE_BYTES {
        return Err(ToolError::InvalidArguments(format!(
            "{} exceeds the {MAX_FILE_SIZE_BYTES}-byte file size limit",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_inside_workspace_is_allowed() {
        let root = Path::new("/workspace");
        let result = ensure_in_workspace(root, Path::new("/workspace/src/main.rs"));
        assert_eq!(result.unwrap(), PathBuf::from("/workspace/src/main.rs"));
    }

    #[test]
    fn relative_path_is_joined_to_root() {
        let root = Path::new("/workspace");
        let result = ensure_in_workspace(root, Path::new("src/main.rs"));
        assert_eq!(result.unwrap(), PathBuf::from("/workspace/src/main.rs"));
    }

    #[test]
    fn dot_dot_escape_is_rejected() {
        let root = Path::new("/workspace");
        let result = ensure_in_workspace(root, Path::new("/workspace/../etc/passwd"));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().to_string(), format!("Invalid arguments: {OUTSIDE_WORKSPACE_MSG}"));
    }

    #[test]
    fn sibling_directory_sharing_a_prefix_is_rejected() {
        let root = Path::new("/workspace");
        let result = ensure_in_workspace(root, Path::new("/workspace-evil/file"));
        assert!(result.is_err());
    }

    #[test]
    fn oversized_file_is_rejected() {
        let result = ensure_within_size_limit(MAX_FILE_SIZE_BYTES + 1, Path::new("big.bin"));
        assert!(result.is_err());
    }

    #[test]
    fn file_at_exactly_the_limit_is_allowed() {
        assert!(ensure_within_size_limit(MAX_FILE_SIZE_BYTES, Path::new("big.bin")).is_ok());
    }
}
