//! Draft persistence errors

use std::path::PathBuf;

/// Errors raised by draft stores and the draft repository
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    /// Filesystem failure
    #[error("draft io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored value is not valid JSON for the expected shape
    #[error("malformed draft '{key}': {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be serialized
    #[error("failed to serialize draft '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stored key name cannot be decoded
    #[error("invalid draft key file name: {0}")]
    InvalidKey(String),
}

impl DraftError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for draft operations
pub type DraftResult<T> = Result<T, DraftError>;
