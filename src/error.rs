use thiserror::Error;

/// Errors produced by the storage layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller supplied argument is unusable (empty path, missing table name, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The database file or object already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The environment does not permit the operation (missing file, read-only directory, ...).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The requested database type is not implemented.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// No row matched the requested key.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The blocking task running an async operation failed to complete.
    #[error(transparent)]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
