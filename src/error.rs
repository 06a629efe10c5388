use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for textweave operations
#[derive(Error, Debug)]
pub enum WeaveError {
    /// IO error when reading files or their metadata
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Include target or cache lookup that does not exist
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    /// A file that (transitively) includes itself
    #[error("Cyclic include: {}", .chain.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> "))]
    CyclicInclude { chain: Vec<PathBuf> },

    /// Include nesting deeper than the configured limit
    #[error("Include depth limit of {limit} exceeded at: {path}")]
    IncludeDepthExceeded { path: PathBuf, limit: usize },

    /// Caller supplied an argument of the wrong shape
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Token pattern that cannot be used for scanning
    #[error("Invalid token pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Required header field absent from a page
    #[error("No {field} found in file: {path}")]
    MissingField { field: String, path: PathBuf },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WeaveError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WeaveError>;
