/// Errors from storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested path does not exist.
    #[error("path not found: {0}")]
    NotFound(String),

    /// The path exists but is not a directory (for `list`), or is a
    /// directory where a file was expected.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A directory component is missing and `recursive` was not requested.
    #[error("parent directory missing for: {0}")]
    MissingParent(String),

    /// A location URL uses a scheme no registered backend handles.
    #[error("unsupported storage scheme in location: {0}")]
    UnsupportedScheme(String),

    /// A location URL is structurally malformed.
    #[error("invalid location {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },

    /// I/O error from the underlying backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
