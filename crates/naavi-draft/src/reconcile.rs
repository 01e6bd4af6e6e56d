//! Draft Reconciliation
//!
//! Merges the three answer tiers of a section with a fixed precedence:
//!
//! | tier | when it applies |
//! |---|---|
//! | live | the section was initialized in this session; wins outright |
//! | remote | has at least one answered question; its answered fields override schema defaults |
//! | persisted | fills every field the remote tier left unset |
//!
//! Files are reconciled separately: remote and persisted records are unioned
//! by filename (remote wins), then merged with live uploads.

use crate::document::DraftDocument;
use naavi_model::{
    AnswerSet, FileRecord, QuestionId, SectionSchema, UploadedFileRef, DEFAULT_FILE_QUESTION,
};
use std::collections::HashSet;

/// Answer tiers available for one section
#[derive(Debug, Clone, Copy, Default)]
pub struct DraftSources<'a> {
    /// In-memory answers; `Some` once the section was initialized this session
    pub live: Option<&'a AnswerSet>,
    /// Locally persisted draft
    pub persisted: Option<&'a DraftDocument>,
    /// Prior submission fetched from the backend
    pub remote: Option<&'a DraftDocument>,
}

impl<'a> DraftSources<'a> {
    #[must_use]
    pub fn with_live(mut self, live: &'a AnswerSet) -> Self {
        self.live = Some(live);
        self
    }

    #[must_use]
    pub fn with_persisted(mut self, persisted: &'a DraftDocument) -> Self {
        self.persisted = Some(persisted);
        self
    }

    #[must_use]
    pub fn with_remote(mut self, remote: &'a DraftDocument) -> Self {
        self.remote = Some(remote);
        self
    }
}

/// Prioritized merge of answer and file tiers
#[derive(Debug, Clone, Copy, Default)]
pub struct DraftReconciler;

impl DraftReconciler {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Initial answers of a section
    ///
    /// Only ids declared by the schema are kept. Remote mechanisms come from
    /// the first non-empty `validationMechanisms` entry.
    #[must_use]
    pub fn hydrate(&self, schema: &SectionSchema, sources: &DraftSources<'_>) -> AnswerSet {
        if let Some(live) = sources.live {
            return live.clone();
        }

        let mut answers: AnswerSet = schema
            .questions
            .iter()
            .filter_map(|q| q.default_value.clone().map(|v| (q.id.clone(), v)))
            .collect();

        let mut set_by_remote: HashSet<QuestionId> = HashSet::new();
        let remote_section = sources
            .remote
            .and_then(|doc| doc.section(&schema.section_name))
            .filter(|section| section.has_answered_question());
        if let Some(section) = remote_section {
            for (id, value) in section.answers().iter() {
                if schema.contains(id.as_str()) && value.is_answered() {
                    answers.set(id.clone(), value.clone());
                    set_by_remote.insert(id.clone());
                }
            }
        }

        if let Some(section) = sources
            .persisted
            .and_then(|doc| doc.section(&schema.section_name))
        {
            for (id, value) in section.answers().iter() {
                if schema.contains(id.as_str()) && !set_by_remote.contains(id) {
                    answers.set(id.clone(), value.clone());
                }
            }
        }

        tracing::debug!(
            section = %schema.section_id,
            from_remote = set_by_remote.len(),
            answers = answers.len(),
            "hydrated section"
        );
        answers
    }

    /// Files attached to a section across all tiers
    ///
    /// Remote and persisted records are unioned by filename with the remote
    /// record winning. Records without a question are assigned one (see
    /// [`assign_file_question`]). Live uploads of the section then replace
    /// restored entries with the same (question, filename).
    #[must_use]
    pub fn reconcile_files(
        &self,
        schema: &SectionSchema,
        remote: &[FileRecord],
        persisted: &[FileRecord],
        live: &[UploadedFileRef],
    ) -> Vec<UploadedFileRef> {
        let mut records: Vec<&FileRecord> = Vec::new();
        let mut names: HashSet<&str> = HashSet::new();
        for record in remote.iter().chain(persisted) {
            if names.insert(record.filename.as_str()) {
                records.push(record);
            }
        }

        let mut files: Vec<UploadedFileRef> = records
            .into_iter()
            .map(|record| UploadedFileRef {
                id: uuid::Uuid::new_v4().to_string(),
                name: record.filename.clone(),
                size_bytes: None,
                checksum: record.checksum.clone(),
                question_id: assign_file_question(schema, record),
                section_id: schema.section_id,
                remote_url: None,
                uploaded_at: None,
            })
            .collect();

        for upload in live.iter().filter(|f| f.section_id == schema.section_id) {
            files.retain(|f| !(f.question_id == upload.question_id && f.name == upload.name));
            files.push(upload.clone());
        }
        files
    }
}

/// Question a stored file record belongs to
///
/// Assigned records keep their question. Otherwise: the section's only file
/// question, else the first file question whose filename hints match, else the
/// first file question, else the backend placeholder.
#[must_use]
pub fn assign_file_question(schema: &SectionSchema, record: &FileRecord) -> QuestionId {
    if record.is_assigned() {
        if let Some(id) = &record.question_id {
            return id.clone();
        }
    }

    let candidates: Vec<_> = schema.file_questions().collect();
    if let [only] = candidates.as_slice() {
        return only.id.clone();
    }

    let lower = record.filename.to_lowercase();
    candidates
        .iter()
        .find(|q| q.matches_filename(&lower))
        .or_else(|| candidates.first())
        .map_or_else(|| QuestionId::from(DEFAULT_FILE_QUESTION), |q| q.id.clone())
}

/// Hydrate with a default reconciler
#[inline]
#[must_use]
pub fn hydrate(schema: &SectionSchema, sources: &DraftSources<'_>) -> AnswerSet {
    DraftReconciler::new().hydrate(schema, sources)
}
