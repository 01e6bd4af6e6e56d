//! Field Validator
//!
//! Decides which visible, required questions of one section are unsatisfied.
//! Answers are resolved per field from the live form state first and the
//! persisted draft second. The remote snapshot only contributes file records.

use crate::visibility::{VisibilityMap, VisibilityResolver};
use naavi_model::{
    AnswerSet, AnswerValue, FileRecord, QuestionId, QuestionSchema, QuestionType, SectionId,
    SectionSchema, UploadedFileRef, MECHANISMS_QUESTION_ID, OTHER_MECHANISM_QUESTION_ID,
    OTHER_OPTION,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Layered answer data for one section
///
/// Precedence for answer values: `live`, then `persisted`. File presence is
/// satisfied by any tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerSources<'a> {
    /// Current in-memory answers
    pub live: Option<&'a AnswerSet>,
    /// Answers from the locally persisted draft
    pub persisted: Option<&'a AnswerSet>,
    /// Files uploaded in the current session (all sections)
    pub live_files: &'a [UploadedFileRef],
    /// File list of the persisted draft section
    pub persisted_files: &'a [FileRecord],
    /// File list of the remote snapshot for the section
    pub remote_files: &'a [FileRecord],
}

impl<'a> AnswerSources<'a> {
    /// No data at all
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Only live answers
    #[inline]
    #[must_use]
    pub fn live(answers: &'a AnswerSet) -> Self {
        Self::empty().with_live(answers)
    }

    /// With live answers
    #[must_use]
    pub fn with_live(mut self, answers: &'a AnswerSet) -> Self {
        self.live = Some(answers);
        self
    }

    /// With persisted-draft answers
    #[must_use]
    pub fn with_persisted(mut self, answers: &'a AnswerSet) -> Self {
        self.persisted = Some(answers);
        self
    }

    /// With live uploads
    #[must_use]
    pub fn with_live_files(mut self, files: &'a [UploadedFileRef]) -> Self {
        self.live_files = files;
        self
    }

    /// With persisted-draft file records
    #[must_use]
    pub fn with_persisted_files(mut self, files: &'a [FileRecord]) -> Self {
        self.persisted_files = files;
        self
    }

    /// With remote file records
    #[must_use]
    pub fn with_remote_files(mut self, files: &'a [FileRecord]) -> Self {
        self.remote_files = files;
        self
    }

    /// Answers as seen by the validator: persisted overlaid with live
    #[must_use]
    pub fn effective_answers(&self) -> Cow<'a, AnswerSet> {
        match (self.live, self.persisted) {
            (Some(live), None) => Cow::Borrowed(live),
            (None, Some(persisted)) => Cow::Borrowed(persisted),
            (Some(live), Some(persisted)) => Cow::Owned(persisted.overlaid_with(live)),
            (None, None) => Cow::Owned(AnswerSet::new()),
        }
    }

    /// Whether any tier holds a file for `(question_id, section_id)`
    #[must_use]
    pub fn has_file(&self, question_id: &str, section_id: SectionId) -> bool {
        let record_matches = |r: &FileRecord| {
            !r.filename.is_empty()
                && r.question_id.as_ref().is_some_and(|q| q.as_str() == question_id)
        };

        self.live_files
            .iter()
            .any(|f| f.belongs_to(question_id, section_id))
            || self.persisted_files.iter().any(record_matches)
            || self.remote_files.iter().any(record_matches)
    }
}

/// Outcome of validating one section
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// No invalid fields
    pub is_valid: bool,
    /// Invalid question ids in schema order
    pub invalid_field_ids: Vec<QuestionId>,
}

impl ValidationResult {
    /// Build from the invalid ids
    #[must_use]
    pub fn from_invalid(invalid_field_ids: Vec<QuestionId>) -> Self {
        Self {
            is_valid: invalid_field_ids.is_empty(),
            invalid_field_ids,
        }
    }

    /// Whether a particular field failed
    #[must_use]
    pub fn is_invalid(&self, id: &str) -> bool {
        self.invalid_field_ids.iter().any(|q| q.as_str() == id)
    }
}

/// Validates required fields of a section
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldValidator {
    resolver: VisibilityResolver,
}

impl FieldValidator {
    /// Create validator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a section against its layered answer sources
    ///
    /// Visibility is resolved from the effective answers, so a field hidden by
    /// the current selection never counts as missing.
    #[must_use]
    pub fn validate_section(
        &self,
        section_id: SectionId,
        schema: &SectionSchema,
        sources: &AnswerSources<'_>,
    ) -> ValidationResult {
        let answers = sources.effective_answers();
        let mechanisms = answers.mechanisms();
        let visibility = self.resolver.resolve(schema, &answers, &mechanisms);

        let invalid = self.invalid_fields(
            section_id,
            schema,
            &visibility,
            &answers,
            &mechanisms,
            sources,
        );
        if !invalid.is_empty() {
            tracing::debug!(
                section = %section_id,
                invalid = invalid.len(),
                "section has unsatisfied required fields"
            );
        }
        ValidationResult::from_invalid(invalid)
    }

    /// Validate with a precomputed visibility map
    ///
    /// Used by callers that already keep a map in sync with the answers.
    #[must_use]
    pub fn validate_with_visibility(
        &self,
        section_id: SectionId,
        schema: &SectionSchema,
        visibility: &VisibilityMap,
        sources: &AnswerSources<'_>,
    ) -> ValidationResult {
        let answers = sources.effective_answers();
        let mechanisms = answers.mechanisms();
        ValidationResult::from_invalid(self.invalid_fields(
            section_id,
            schema,
            visibility,
            &answers,
            &mechanisms,
            sources,
        ))
    }

    fn invalid_fields(
        &self,
        section_id: SectionId,
        schema: &SectionSchema,
        visibility: &VisibilityMap,
        answers: &AnswerSet,
        mechanisms: &[String],
        sources: &AnswerSources<'_>,
    ) -> Vec<QuestionId> {
        schema
            .questions
            .iter()
            .filter(|q| q.required && visibility.is_visible(q.id.as_str()))
            .filter(|q| !self.is_satisfied(section_id, q, answers, mechanisms, sources))
            .map(|q| q.id.clone())
            .collect()
    }

    fn is_satisfied(
        &self,
        section_id: SectionId,
        question: &QuestionSchema,
        answers: &AnswerSet,
        mechanisms: &[String],
        sources: &AnswerSources<'_>,
    ) -> bool {
        let id = question.id.as_str();

        if id == OTHER_MECHANISM_QUESTION_ID && !mechanisms.iter().any(|m| m == OTHER_OPTION) {
            return true;
        }

        let value = answers.get(id);
        match question.kind {
            QuestionType::Radio => value.is_some_and(|v| !v.is_empty()),
            QuestionType::Checkbox if id == MECHANISMS_QUESTION_ID => !mechanisms.is_empty(),
            QuestionType::Checkbox => value.is_some_and(AnswerValue::is_true),
            QuestionType::Text | QuestionType::Number | QuestionType::Textarea => {
                value.is_some_and(|v| !v.as_text().trim().is_empty())
            }
            QuestionType::File => sources.has_file(id, section_id),
            QuestionType::Info => true,
        }
    }
}

/// Validate a section with a default validator
#[inline]
#[must_use]
pub fn validate_section(
    section_id: SectionId,
    schema: &SectionSchema,
    sources: &AnswerSources<'_>,
) -> ValidationResult {
    FieldValidator::new().validate_section(section_id, schema, sources)
}
