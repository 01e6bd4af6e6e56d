//! Draft document formats
//!
//! [`DraftDocument`] is the reconciled questionnaire stored under
//! `formData-<nf>-<version>`. The backend returns the same shape (with
//! snake_case section names), so it doubles as the remote snapshot.
//! [`FormState`] is the raw per-section form state stored under
//! `questionnaire-<nf>-<version>`.

use naavi_model::{
    AnswerSet, AnswerValue, DraftKey, FileRecord, QuestionId, SectionId, SectionSchema,
    MECHANISMS_QUESTION_ID, OTHER_MECHANISM_QUESTION_ID,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One answered question as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftQuestion {
    /// Question id
    pub question_id: QuestionId,
    /// Prompt copied from the schema at save time
    #[serde(default)]
    pub question_text: String,
    /// Recorded answer
    pub answer: AnswerValue,
}

/// One section of a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSection {
    /// Storage name of the section
    #[serde(alias = "section_name")]
    pub section_name: String,
    /// Answered questions
    #[serde(default)]
    pub questions: Vec<DraftQuestion>,
    /// Attached files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileRecord>,
}

impl DraftSection {
    #[must_use]
    pub fn new(section_name: impl Into<String>) -> Self {
        Self {
            section_name: section_name.into(),
            questions: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Serialize an answer set against its schema
    ///
    /// Questions keep the answer set's order. Ids unknown to the schema are
    /// dropped; the mechanisms list and the "other" text are only written
    /// when non-empty.
    #[must_use]
    pub fn from_answers(
        schema: &SectionSchema,
        answers: &AnswerSet,
        files: Vec<FileRecord>,
    ) -> Self {
        let questions = answers
            .iter()
            .filter_map(|(id, answer)| {
                let question = schema.question(id.as_str())?;
                let special = id.as_str() == MECHANISMS_QUESTION_ID
                    || id.as_str() == OTHER_MECHANISM_QUESTION_ID;
                if special && answer.is_empty() {
                    return None;
                }
                Some(DraftQuestion {
                    question_id: id.clone(),
                    question_text: question.text.clone(),
                    answer: answer.clone(),
                })
            })
            .collect();

        Self {
            section_name: schema.section_name.clone(),
            questions,
            files,
        }
    }

    /// Answers recorded in this section
    ///
    /// A later entry for the same question replaces an earlier one, except
    /// for the mechanisms list where the first non-empty entry is kept.
    #[must_use]
    pub fn answers(&self) -> AnswerSet {
        let mut answers = AnswerSet::new();
        for q in &self.questions {
            if q.question_id.as_str() == MECHANISMS_QUESTION_ID
                && answers.get(MECHANISMS_QUESTION_ID).is_some_and(|v| !v.is_empty())
            {
                continue;
            }
            answers.set(q.question_id.clone(), q.answer.clone());
        }
        answers
    }

    /// Whether at least one question carries a non-empty answer
    #[must_use]
    pub fn has_answered_question(&self) -> bool {
        self.questions.iter().any(|q| q.answer.is_answered())
    }

    /// Replace or append a file by filename
    pub fn upsert_file(&mut self, record: FileRecord) {
        self.files.retain(|f| f.filename != record.filename);
        self.files.push(record);
    }

    /// Remove a file by filename
    pub fn remove_file(&mut self, filename: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.filename != filename);
        self.files.len() != before
    }
}

/// Reconciled questionnaire document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDocument {
    /// Network function name
    #[serde(alias = "nf_name")]
    pub nf_name: String,
    /// Version name
    pub version: String,
    /// Sections in save order
    #[serde(default)]
    pub sections: Vec<DraftSection>,
}

impl DraftDocument {
    /// Empty document for a key
    #[must_use]
    pub fn new(key: &DraftKey) -> Self {
        Self {
            nf_name: key.network_function.clone(),
            version: key.version.clone(),
            sections: Vec::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> DraftKey {
        DraftKey::new(self.nf_name.clone(), self.version.clone())
    }

    /// Section by storage name, case-insensitive
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&DraftSection> {
        self.sections
            .iter()
            .find(|s| s.section_name.eq_ignore_ascii_case(name))
    }

    /// Mutable section by storage name, case-insensitive
    pub fn section_mut(&mut self, name: &str) -> Option<&mut DraftSection> {
        self.sections
            .iter_mut()
            .find(|s| s.section_name.eq_ignore_ascii_case(name))
    }

    /// Section by name, appended when missing
    pub fn section_or_insert(&mut self, name: &str) -> &mut DraftSection {
        let index = match self
            .sections
            .iter()
            .position(|s| s.section_name.eq_ignore_ascii_case(name))
        {
            Some(index) => index,
            None => {
                self.sections.push(DraftSection::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }

    /// Answers of a section (empty when absent)
    #[must_use]
    pub fn answers_for(&self, name: &str) -> AnswerSet {
        self.section(name).map(DraftSection::answers).unwrap_or_default()
    }

    /// File list of a section (empty when absent)
    #[must_use]
    pub fn files_for(&self, name: &str) -> &[FileRecord] {
        self.section(name).map(|s| s.files.as_slice()).unwrap_or_default()
    }
}

/// Raw per-section form state of a session
///
/// Sections present in `local_form_data` were touched by the user and count
/// as initialized when the state is restored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    /// Answers keyed by section id
    #[serde(default)]
    pub local_form_data: BTreeMap<SectionId, AnswerSet>,
    /// Selected mechanisms keyed by section id
    #[serde(default)]
    pub selected_mechanisms: BTreeMap<SectionId, Vec<String>>,
    /// "Other" mechanism text keyed by section id
    #[serde(default)]
    pub other_mechanism: BTreeMap<SectionId, String>,
}

impl FormState {
    /// Sections the user already interacted with
    #[must_use]
    pub fn initialized_sections(&self) -> BTreeSet<SectionId> {
        self.local_form_data.keys().copied().collect()
    }

    /// Full answer set of a section including mechanism fields
    #[must_use]
    pub fn section_answers(&self, section: SectionId) -> Option<AnswerSet> {
        let mut answers = self.local_form_data.get(&section).cloned()?;
        if let Some(mechanisms) = self.selected_mechanisms.get(&section) {
            answers.set(MECHANISMS_QUESTION_ID, AnswerValue::List(mechanisms.clone()));
        }
        if let Some(other) = self.other_mechanism.get(&section).filter(|s| !s.is_empty()) {
            answers.set(OTHER_MECHANISM_QUESTION_ID, other.as_str());
        }
        Some(answers)
    }

    /// Record a section's answers, splitting out mechanism fields
    pub fn record_section(&mut self, section: SectionId, answers: &AnswerSet) {
        let mut plain = answers.clone();
        let mechanisms = plain
            .remove(MECHANISMS_QUESTION_ID)
            .map(|v| v.as_list())
            .unwrap_or_default();
        let other = plain
            .remove(OTHER_MECHANISM_QUESTION_ID)
            .map(|v| v.as_text().into_owned())
            .unwrap_or_default();

        self.local_form_data.insert(section, plain);
        self.selected_mechanisms.insert(section, mechanisms);
        self.other_mechanism.insert(section, other);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naavi_model::{QuestionSchema, QuestionType};
    use pretty_assertions::assert_eq;

    fn schema() -> SectionSchema {
        SectionSchema::new(
            SectionId(0),
            "healthcheck",
            vec![
                QuestionSchema::new("performed", QuestionType::Radio)
                    .with_text("Performed?")
                    .with_options(["yes", "no"]),
                QuestionSchema::new(MECHANISMS_QUESTION_ID, QuestionType::Checkbox)
                    .with_options(["cli", "other"]),
                QuestionSchema::new(OTHER_MECHANISM_QUESTION_ID, QuestionType::Text),
            ],
        )
    }

    #[test]
    fn parses_backend_shape() {
        let json = r#"{
            "nfName": "Nokia - 5G CHF ME",
            "version": "v1.0.0",
            "sections": [{
                "nf_name": "Nokia - 5G CHF ME",
                "version": "v1.0.0",
                "section_name": "healthcheck",
                "questions": [{"questionId": "performed", "questionText": "Performed?", "answer": "yes"}],
                "files": [{"filename": "mop.pdf", "checksum": "abc", "question_id": "uploadMOPs"}]
            }]
        }"#;
        let doc: DraftDocument = serde_json::from_str(json).unwrap();
        let section = doc.section("HealthCheck").unwrap();
        assert_eq!(section.answers().get("performed"), Some(&AnswerValue::text("yes")));
        assert_eq!(section.files[0].question_id, Some(QuestionId::from("uploadMOPs")));
    }

    #[test]
    fn first_non_empty_mechanisms_entry_wins() {
        let mut section = DraftSection::new("healthcheck");
        for answer in [
            AnswerValue::list(Vec::<String>::new()),
            AnswerValue::list(["cli"]),
            AnswerValue::list(["api"]),
        ] {
            section.questions.push(DraftQuestion {
                question_id: MECHANISMS_QUESTION_ID.into(),
                question_text: String::new(),
                answer,
            });
        }
        assert_eq!(section.answers().mechanisms(), vec!["cli".to_string()]);
    }

    #[test]
    fn from_answers_skips_unknown_and_empty_mechanisms() {
        let answers = AnswerSet::new()
            .with("performed", "yes")
            .with("ghost", "boo")
            .with(MECHANISMS_QUESTION_ID, AnswerValue::list(Vec::<String>::new()))
            .with(OTHER_MECHANISM_QUESTION_ID, "");
        let section = DraftSection::from_answers(&schema(), &answers, Vec::new());
        assert_eq!(section.questions.len(), 1);
        assert_eq!(section.questions[0].question_text, "Performed?");
    }

    #[test]
    fn form_state_round_trips_mechanisms() {
        let mut state = FormState::default();
        let answers = AnswerSet::new()
            .with("performed", "yes")
            .with(MECHANISMS_QUESTION_ID, AnswerValue::list(["cli", "other"]))
            .with(OTHER_MECHANISM_QUESTION_ID, "custom");
        state.record_section(SectionId(4), &answers);

        let json = serde_json::to_string(&state).unwrap();
        let restored: FormState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.initialized_sections(), BTreeSet::from([SectionId(4)]));

        let back = restored.section_answers(SectionId(4)).unwrap();
        assert_eq!(back.mechanisms(), vec!["cli".to_string(), "other".to_string()]);
        assert_eq!(back.get(OTHER_MECHANISM_QUESTION_ID), Some(&AnswerValue::text("custom")));
        assert!(restored.section_answers(SectionId(5)).is_none());
    }
}
