//! Attached-file records
//!
//! Two shapes exist: the compact record stored in drafts and returned by the
//! backend ([`FileRecord`]), and the session-side reference to an uploaded
//! file ([`UploadedFileRef`]).

use crate::ids::{QuestionId, SectionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Question id used by the backend when a file was uploaded without one
pub const DEFAULT_FILE_QUESTION: &str = "defaultFileQuestion";

/// File entry as persisted in a draft section or returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Original file name, unique per section
    pub filename: String,
    /// Content checksum reported by whoever stored the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Owning question (`None` for legacy records)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<QuestionId>,
}

impl FileRecord {
    /// Create a record bound to a question
    #[must_use]
    pub fn new(filename: impl Into<String>, question_id: impl Into<QuestionId>) -> Self {
        Self {
            filename: filename.into(),
            checksum: None,
            question_id: Some(question_id.into()),
        }
    }

    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Whether the record names a real question
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        matches!(&self.question_id, Some(q) if q.as_str() != DEFAULT_FILE_QUESTION && !q.as_str().is_empty())
    }
}

/// Session-side reference to an attached file
///
/// Created on successful upload or when files are restored from a draft or
/// the backend. Restored files carry no size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileRef {
    /// Session-local identifier
    pub id: String,
    /// File name
    pub name: String,
    /// Size in bytes, when known
    pub size_bytes: Option<u64>,
    /// Content checksum
    pub checksum: Option<String>,
    /// Owning question
    pub question_id: QuestionId,
    /// Owning section
    pub section_id: SectionId,
    /// Download location
    pub remote_url: Option<String>,
    /// Upload time for live uploads
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl UploadedFileRef {
    /// Whether this file belongs to the given question of the given section
    #[inline]
    #[must_use]
    pub fn belongs_to(&self, question_id: &str, section_id: SectionId) -> bool {
        self.section_id == section_id && self.question_id.as_str() == question_id
    }

    #[must_use]
    pub fn to_record(&self) -> FileRecord {
        FileRecord {
            filename: self.name.clone(),
            checksum: self.checksum.clone(),
            question_id: Some(self.question_id.clone()),
        }
    }
}
