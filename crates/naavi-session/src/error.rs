//! Error types for questionnaire sessions
//!
//! Covers:
//! - Backend failures (transport, non-2xx, malformed bodies)
//! - File constraint violations, rejected before any network call
//! - Busy operations and upload timeouts
//!
//! Validation failures are not errors; see `naavi_validation`.

use crate::config::ConfigError;
use naavi_draft::DraftError;
use naavi_model::{QuestionId, SchemaError, SectionId};

/// Backend call failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Request never produced a response
    #[error("request failed: {0}")]
    Transport(String),

    /// Non-2xx response
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Server-provided message, or the raw body
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Endpoint URL could not be built
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Result for backend calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Upload rejected by a local limit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileConstraintViolation {
    /// Per-question `maxFiles` exceeded
    #[error(
        "You can only upload a maximum of {max} files for this question. \
         Currently: {existing}, Attempting to add: {adding}"
    )]
    TooManyFiles {
        /// Question receiving the files
        question: QuestionId,
        /// Question limit
        max: u32,
        /// Files already attached
        existing: usize,
        /// Files in this batch
        adding: usize,
    },

    /// Single-file limit exceeded
    #[error(
        "The following files exceed the {} MB limit per file: {}",
        .limit / (1024 * 1024),
        .filenames.join(", ")
    )]
    FileTooLarge {
        /// Offending files
        filenames: Vec<String>,
        /// Limit in bytes
        limit: u64,
    },

    /// Session upload budget exceeded
    #[error(
        "Total upload size cannot exceed {} MB. Current: {} MB, Attempting to add: {} MB",
        .limit / (1024 * 1024),
        megabytes(.current),
        megabytes(.adding)
    )]
    TotalTooLarge {
        /// Bytes uploaded so far
        current: u64,
        /// Bytes in this batch
        adding: u64,
        /// Budget in bytes
        limit: u64,
    },
}

#[allow(clippy::cast_precision_loss, clippy::trivially_copy_pass_by_ref)]
fn megabytes(bytes: &u64) -> String {
    format!("{:.2}", *bytes as f64 / (1024.0 * 1024.0))
}

/// Operation guarded by a busy flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyOperation {
    /// File upload batch
    Uploading,
    /// Draft save
    Saving,
    /// Final submission
    Submitting,
}

impl std::fmt::Display for BusyOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uploading => "upload",
            Self::Saving => "save",
            Self::Submitting => "submit",
        };
        f.write_str(name)
    }
}

/// Main session error type
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Backend failure
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Local draft failure
    #[error("draft error: {0}")]
    Draft(#[from] DraftError),

    /// Configuration failure
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Schema failure
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Upload rejected locally
    #[error("{0}")]
    FileConstraint(#[from] FileConstraintViolation),

    /// Same operation already in flight
    #[error("{0} already in progress")]
    Busy(BusyOperation),

    /// Upload batch exceeded its time bound
    #[error("upload timed out after {0}s")]
    UploadTimeout(u64),

    /// Section not in the registry
    #[error("unknown section: {0}")]
    UnknownSection(SectionId),

    /// Question not in the section
    #[error("unknown question {question} in section {section}")]
    UnknownQuestion {
        /// Section
        section: SectionId,
        /// Question
        question: QuestionId,
    },

    /// File not attached to the section
    #[error("unknown file {0}")]
    UnknownFile(String),

    /// Question does not accept uploads
    #[error("question {0} does not accept files")]
    NotAFileQuestion(QuestionId),

    /// Session was closed
    #[error("session for {0} is closed")]
    Stale(String),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_messages_name_the_limit() {
        let too_many = FileConstraintViolation::TooManyFiles {
            question: "uploadMOPs".into(),
            max: 5,
            existing: 4,
            adding: 2,
        };
        assert_eq!(
            too_many.to_string(),
            "You can only upload a maximum of 5 files for this question. \
             Currently: 4, Attempting to add: 2"
        );

        let large = FileConstraintViolation::FileTooLarge {
            filenames: vec!["a.iso".into(), "b.iso".into()],
            limit: 30 * 1024 * 1024,
        };
        assert_eq!(
            large.to_string(),
            "The following files exceed the 30 MB limit per file: a.iso, b.iso"
        );

        let total = FileConstraintViolation::TotalTooLarge {
            current: 290 * 1024 * 1024,
            adding: 15 * 1024 * 1024,
            limit: 300 * 1024 * 1024,
        };
        assert_eq!(
            total.to_string(),
            "Total upload size cannot exceed 300 MB. Current: 290.00 MB, Attempting to add: 15.00 MB"
        );
    }

    #[test]
    fn busy_message() {
        assert_eq!(
            SessionError::Busy(BusyOperation::Saving).to_string(),
            "save already in progress"
        );
    }
}
