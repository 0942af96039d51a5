//! Configuration error types.

use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// The file path that failed to read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A config file's TOML could not be parsed.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// The file path (or a placeholder for an in-memory buffer).
        path: String,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A resolved configuration value failed validation.
    #[error("invalid config value for {field}: {message}")]
    ValidationError {
        /// The dotted field path that failed validation.
        field: String,
        /// A human-readable description of the failure.
        message: String,
    },

    /// The user's home directory could not be determined.
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Convenience alias for this crate's fallible operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
