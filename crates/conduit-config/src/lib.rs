#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered process configuration (§10.3): log level, storage path, default
//! timeouts, max tool rounds, and HTTP connection pool size, loaded from a
//! TOML file with environment variable overrides.
//!
//! # Usage
//!
//! ```rust,no_run
//! use conduit_config::Config;
//!
//! // Defaults -> system -> user -> workspace -> CONDUIT_* env fallbacks.
//! let resolved = Config::load(Some(std::path::Path::new("."))).unwrap();
//! let config = resolved.config;
//! println!("tool rounds: {}", config.runtime.max_tool_rounds);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Workspace** (`{workspace}/.conduit/config.toml`)
//! 2. **User** (`~/.conduit/config.toml`)
//! 3. **System** (`/etc/conduit/config.toml`)
//! 4. **Environment variables** (`CONDUIT_*`) — fallback for fields no file layer sets
//! 5. **Embedded defaults** (`defaults.toml`, compiled into the binary)
//!
//! The MCP server list is a separate, JSON-formatted config surface handled
//! by `conduit_mcp::config` — this crate only covers process-level settings.

/// Environment variable fallback and `${VAR}` resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Config file discovery and layered loading.
pub mod loader;
/// Layered configuration merging with precedence.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use types::{Config, HttpSection, LogSection, RuntimeSection, StorageSection, TimeoutsSection};

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// See [`loader::load`] for the full algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, None)
    }

    /// Load configuration with an explicit home directory override.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_home(
        workspace_root: Option<&std::path::Path>,
        home_dir: &std::path::Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, Some(home_dir))
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
