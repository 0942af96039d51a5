//! Config file discovery and layered loading (§10.3).
//!
//! `load()` resolves, in ascending precedence:
//! 1. the embedded `defaults.toml`
//! 2. `/etc/conduit/config.toml` (system)
//! 3. `~/.conduit/config.toml` (user)
//! 4. `{workspace}/.conduit/config.toml` (workspace)
//! 5. `CONDUIT_*` env var fallbacks, for any field still unset
//!
//! then resolves `${VAR}` references, deserializes, and validates.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars, resolve_env_references};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::Config;
use crate::validate;

const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB) — a guard against a misconfigured
/// or malicious path pointing at something other than a small TOML file.
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A successfully resolved configuration, plus which file layers contributed.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The merged, validated configuration.
    pub config: Config,
    /// Paths of every layer file that was found and merged, in load order.
    pub loaded_files: Vec<String>,
}

/// Load the layered configuration.
///
/// `workspace_root` is the root of the current project; if `None`, the
/// workspace layer is skipped. `home_override` substitutes for the real home
/// directory (used by tests and by an explicit `--config-home` flag).
///
/// # Errors
///
/// Returns a [`ConfigError`] if any file layer is malformed, oversized, or
/// the final merged configuration fails validation.
pub fn load(workspace_root: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let env_vars = collect_env_vars();
    let mut merged: toml::Value = toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
        path: "<embedded defaults>".to_string(),
        source: e,
    })?;
    let mut loaded_files = Vec::new();

    let system_path = PathBuf::from("/etc/conduit/config.toml");
    if let Some(overlay) = try_load_file(&system_path)? {
        deep_merge(&mut merged, &overlay);
        loaded_files.push(system_path.display().to_string());
        info!(path = %system_path.display(), "loaded system config");
    }

    let home_dir = match home_override {
        Some(h) => Some(h.to_path_buf()),
        None => home_directory(),
    };
    if let Some(home_dir) = &home_dir {
        let user_path = home_dir.join(".conduit").join("config.toml");
        if let Some(overlay) = try_load_file(&user_path)? {
            deep_merge(&mut merged, &overlay);
            loaded_files.push(user_path.display().to_string());
            info!(path = %user_path.display(), "loaded user config");
        }
    }

    if let Some(ws_root) = workspace_root {
        let ws_path = ws_root.join(".conduit").join("config.toml");
        if let Some(overlay) = try_load_file(&ws_path)? {
            deep_merge(&mut merged, &overlay);
            loaded_files.push(ws_path.display().to_string());
            info!(path = %ws_path.display(), "loaded workspace config");
        }
    }

    let env_count = apply_env_fallbacks(&mut merged, &env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    resolve_env_references(&mut merged, &env_vars);
    let config: Config = merged.try_into().map_err(|e: toml::de::Error| ConfigError::ParseError {
        path: "<merged config>".to_string(),
        source: e,
    })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig { config, loaded_files })
}

/// Load a config from a single file, with no layering and no env fallbacks.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let metadata = std::fs::metadata(path).map_err(|e| ConfigError::ReadError { path: path.display().to_string(), source: e })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!("config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit", metadata.len()),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError { path: path.display().to_string(), source: e })?;
    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError { path: path.display().to_string(), source: e })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file as a raw TOML value, returning `None` if it doesn't
/// exist. Reads the content in one shot (no separate stat-then-read) so the
/// size guard below can't be bypassed by a TOCTOU swap.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => return Err(ConfigError::ReadError { path: path.display().to_string(), source: e }),
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!("config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit", content.len()),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError { path: path.display().to_string(), source: e })?;
    Ok(Some(value))
}

fn home_directory() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_and_deserialize() {
        let value: toml::Value = toml::from_str(DEFAULTS_TOML).unwrap();
        assert!(value.as_table().unwrap().contains_key("runtime"));
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config.runtime.max_tool_rounds, 8);
        assert_eq!(config.http.pool_size, 32);
    }

    #[test]
    fn load_file_rejects_a_missing_path() {
        let result = load_file(Path::new("/nonexistent/conduit/config.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn try_load_file_returns_none_for_a_missing_path() {
        let result = try_load_file(Path::new("/nonexistent/conduit/config.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn oversized_config_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_string() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();
        let result = try_load_file(&file_path);
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn workspace_layer_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        std::fs::create_dir_all(&home).unwrap();
        let ws = dir.path().join("workspace");
        std::fs::create_dir_all(ws.join(".conduit")).unwrap();
        std::fs::write(ws.join(".conduit").join("config.toml"), "[runtime]\nmax_tool_rounds = 20\n").unwrap();

        let resolved = load(Some(&ws), Some(&home)).unwrap();
        assert_eq!(resolved.config.runtime.max_tool_rounds, 20);
        assert_eq!(resolved.loaded_files.len(), 1);
    }

    #[test]
    fn load_without_any_files_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        std::fs::create_dir_all(&home).unwrap();
        let resolved = load(None, Some(&home)).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
    }
}
