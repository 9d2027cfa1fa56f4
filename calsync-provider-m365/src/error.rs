//! Error types for the Microsoft 365 mapping engine.

use thiserror::Error;

/// Errors raised while mapping between calendar objects and remote resources.
#[derive(Error, Debug)]
pub enum MappingError {
    /// The object uses a recurrence or attachment shape the remote schema cannot express
    #[error("Unsupported shape: {0}")]
    UnsupportedShape(String),

    /// A reminder or recurrence invariant of the object is violated
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// The operation is not available for this kind of object
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A remote resource lacks a member a read requires, or holds a malformed one
    #[error("Invalid remote resource: {0}")]
    InvalidRemote(String),

    /// Errors from the transport collaborator, passed through unchanged
    #[error(transparent)]
    Transport(#[from] anyhow::Error),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;
