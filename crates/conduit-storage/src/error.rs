//! Storage error types.

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested key or item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Internal(String),

    /// Connection to the storage backend failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The namespace or key is invalid.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// `create_named` was called with a `(provider, auth_type, name)` that
    /// already exists (§4.1).
    #[error("uniqueness violation: {0} already exists")]
    UniquenessViolation(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
