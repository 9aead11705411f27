//! CLI error types.

use thiserror::Error;

/// Errors surfaced by the `linkage` command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Error from the relation service or storage.
    #[error(transparent)]
    Core(#[from] linkage_core::Error),

    /// Malformed JSON input.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations.
pub type CliResult<T> = std::result::Result<T, CliError>;
