//! Static question and section definitions

use crate::answer::AnswerValue;
use crate::ids::{QuestionId, SectionId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Input kind of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Single choice
    Radio,
    /// Boolean checkbox, or multi-select for the mechanisms group
    Checkbox,
    /// Single-line text
    Text,
    /// Numeric input
    Number,
    /// Multi-line text
    Textarea,
    /// File attachment
    File,
    /// Display-only block
    Info,
}

impl QuestionType {
    /// Whether the value is validated as free text
    #[inline]
    #[must_use]
    pub fn is_textual(self) -> bool {
        matches!(self, Self::Text | Self::Number | Self::Textarea)
    }
}

/// Selectable option of a radio or checkbox question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Stored value
    pub value: String,
    /// Display label
    pub label: String,
}

/// One question of a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSchema {
    /// Identifier, unique within the section
    pub id: QuestionId,
    /// Prompt shown to the user and copied into drafts as `questionText`
    #[serde(default)]
    pub text: String,
    /// Input kind
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// Must be answered when visible
    #[serde(default)]
    pub required: bool,
    /// Choices for radio/checkbox questions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    /// Option value -> dependent question ids
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub conditional_questions: IndexMap<String, Vec<QuestionId>>,
    /// Upper bound on attached files (file questions only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u32>,
    /// Hidden until revealed by a conditional branch
    #[serde(default)]
    pub hidden: bool,
    /// Initial value on first visit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<AnswerValue>,
    /// Lower-case filename fragments used to route unassigned files here
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filename_hints: Vec<String>,
}

impl QuestionSchema {
    /// Minimal question, visible and optional
    #[must_use]
    pub fn new(id: impl Into<QuestionId>, kind: QuestionType) -> Self {
        Self {
            id: id.into(),
            text: String::new(),
            kind,
            required: false,
            options: Vec::new(),
            conditional_questions: IndexMap::new(),
            max_files: None,
            hidden: false,
            default_value: None,
            filename_hints: Vec::new(),
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// With options, label = value
    #[must_use]
    pub fn with_options<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = values
            .into_iter()
            .map(|v| {
                let value = v.into();
                QuestionOption {
                    label: value.clone(),
                    value,
                }
            })
            .collect();
        self
    }

    #[must_use]
    pub fn with_branch<I, S>(mut self, option: impl Into<String>, dependents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<QuestionId>,
    {
        self.conditional_questions
            .insert(option.into(), dependents.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_max_files(mut self, max: u32) -> Self {
        self.max_files = Some(max);
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<AnswerValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_filename_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filename_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    /// Every dependent id referenced by any branch, in declaration order
    pub fn all_dependents(&self) -> impl Iterator<Item = &QuestionId> {
        self.conditional_questions.values().flatten()
    }

    /// Whether a lower-cased filename matches one of the hints
    #[must_use]
    pub fn matches_filename(&self, filename_lower: &str) -> bool {
        self.filename_hints
            .iter()
            .any(|hint| filename_lower.contains(hint.as_str()))
    }
}

/// One wizard step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSchema {
    /// Numeric step id
    pub section_id: SectionId,
    /// Storage name used in drafts and by the backend (`healthcheck`, ...)
    pub section_name: String,
    /// Display title
    #[serde(default)]
    pub section_title: String,
    /// Questions in display order
    pub questions: Vec<QuestionSchema>,
}

impl SectionSchema {
    #[must_use]
    pub fn new(
        section_id: SectionId,
        section_name: impl Into<String>,
        questions: Vec<QuestionSchema>,
    ) -> Self {
        let section_name = section_name.into();
        Self {
            section_id,
            section_title: section_name.clone(),
            section_name,
            questions,
        }
    }

    /// Find a question by id
    #[must_use]
    pub fn question(&self, id: &str) -> Option<&QuestionSchema> {
        self.questions.iter().find(|q| q.id.as_str() == id)
    }

    /// Whether the section declares the question
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.question(id).is_some()
    }

    /// File questions in display order
    pub fn file_questions(&self) -> impl Iterator<Item = &QuestionSchema> {
        self.questions
            .iter()
            .filter(|q| q.kind == QuestionType::File)
    }

    /// Case-insensitive match against a stored section name
    #[must_use]
    pub fn name_matches(&self, name: &str) -> bool {
        self.section_name.eq_ignore_ascii_case(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_deserializes_camel_case() {
        let yaml = r#"
id: validationMechanisms
type: checkbox
required: true
options:
  - { value: cli, label: CLI }
  - { value: other, label: Other }
conditionalQuestions:
  other: [otherMechanism]
"#;
        let q: QuestionSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(q.kind, QuestionType::Checkbox);
        assert!(q.required);
        assert!(!q.hidden);
        assert_eq!(q.conditional_questions["other"], vec![QuestionId::from("otherMechanism")]);
    }

    #[test]
    fn all_dependents_flattens_branches() {
        let q = QuestionSchema::new("performed", QuestionType::Radio)
            .with_options(["yes", "no"])
            .with_branch("yes", ["a", "b"])
            .with_branch("no", ["c"]);
        let ids: Vec<&str> = q.all_dependents().map(QuestionId::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn section_name_match_ignores_case() {
        let section = SectionSchema::new(SectionId(0), "healthcheck", vec![]);
        assert!(section.name_matches("HealthCheck"));
        assert!(!section.name_matches("install"));
    }
}
