//! Error types for the calsync core crate.

use thiserror::Error;

/// Errors that can occur in core calsync operations.
#[derive(Error, Debug)]
pub enum CalSyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("ICS generation error: {0}")]
    IcsGenerate(String),

    #[error("Invalid recurrence rule: {0}")]
    RuleParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core calsync operations.
pub type CalSyncResult<T> = Result<T, CalSyncError>;
