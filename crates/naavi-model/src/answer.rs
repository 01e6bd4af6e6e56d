//! Answer values and per-section answer sets

use crate::ids::QuestionId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Question id of the multi-select validation mechanisms checkbox group
pub const MECHANISMS_QUESTION_ID: &str = "validationMechanisms";

/// Question id of the free-text "other mechanism" field
pub const OTHER_MECHANISM_QUESTION_ID: &str = "otherMechanism";

/// Option value that opens the free-text mechanism field
pub const OTHER_OPTION: &str = "other";

/// A single answer as stored in drafts and remote submissions
///
/// Untagged so that documents keep the plain JSON shape (`"yes"`, `true`,
/// `["cli", "other"]`, `12`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Checkbox state
    Bool(bool),
    /// Numeric answer as delivered by the backend
    Number(serde_json::Number),
    /// Radio selection or free text
    Text(String),
    /// Multi-select values
    List(Vec<String>),
}

impl AnswerValue {
    #[inline]
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Empty string or empty list
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    /// Whether the value counts as "answered" for completion metrics
    ///
    /// Whitespace-only text is unanswered, `false` is unanswered.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        match self {
            Self::Text(s) => !s.trim().is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Bool(b) => *b,
            Self::Number(_) => true,
        }
    }

    /// String form of the value
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Bool(b) => Cow::Owned(b.to_string()),
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::List(items) => Cow::Owned(items.join(",")),
        }
    }

    /// `true` only for the boolean `true`
    #[inline]
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    /// Multi-select items; a single text value is treated as one item
    #[must_use]
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.clone(),
            Self::Text(s) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Parse as an integer step count
    #[must_use]
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Number(n) => n.as_u64(),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Answers of one section instance, keyed by question id
///
/// Insertion order is preserved so serialized drafts follow the order in
/// which answers were recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    answers: IndexMap<QuestionId, AnswerValue>,
}

impl AnswerSet {
    /// Create an empty answer set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, id: impl Into<QuestionId>, value: impl Into<AnswerValue>) -> Self {
        self.set(id, value);
        self
    }

    /// Record an answer, replacing any previous value
    pub fn set(&mut self, id: impl Into<QuestionId>, value: impl Into<AnswerValue>) {
        self.answers.insert(id.into(), value.into());
    }

    pub fn remove(&mut self, id: &str) -> Option<AnswerValue> {
        self.answers.shift_remove(id)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AnswerValue> {
        self.answers.get(id)
    }

    /// Whether an answer is recorded (even an empty one)
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.answers.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &AnswerValue)> {
        self.answers.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Whether at least one answer is non-empty
    #[must_use]
    pub fn has_answered(&self) -> bool {
        self.answers.values().any(AnswerValue::is_answered)
    }

    /// Selected validation mechanisms (empty when none recorded)
    #[must_use]
    pub fn mechanisms(&self) -> Vec<String> {
        self.get(MECHANISMS_QUESTION_ID)
            .map(AnswerValue::as_list)
            .unwrap_or_default()
    }

    /// Overlay `other` on top of `self`: every answer in `other` wins
    #[must_use]
    pub fn overlaid_with(&self, other: &AnswerSet) -> AnswerSet {
        let mut merged = self.clone();
        for (id, value) in other.iter() {
            merged.answers.insert(id.clone(), value.clone());
        }
        merged
    }
}

impl FromIterator<(QuestionId, AnswerValue)> for AnswerSet {
    fn from_iter<T: IntoIterator<Item = (QuestionId, AnswerValue)>>(iter: T) -> Self {
        Self {
            answers: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn untagged_json_shapes() {
        let values: Vec<AnswerValue> =
            serde_json::from_str(r#"["yes", true, ["cli", "other"], 12]"#).unwrap();
        assert_eq!(values[0], AnswerValue::text("yes"));
        assert_eq!(values[1], AnswerValue::Bool(true));
        assert_eq!(values[2], AnswerValue::list(["cli", "other"]));
        assert_eq!(values[3].as_count(), Some(12));
    }

    #[test]
    fn number_round_trips_exactly() {
        let value: AnswerValue = serde_json::from_str("12").unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), "12");
    }

    #[test]
    fn whitespace_is_not_answered() {
        assert!(!AnswerValue::text("   ").is_answered());
        assert!(AnswerValue::text("x").is_answered());
        assert!(!AnswerValue::text("").is_answered());
        assert!(!AnswerValue::Bool(false).is_answered());
    }

    #[test]
    fn overlay_prefers_other() {
        let base = AnswerSet::new().with("a", "1").with("b", "2");
        let top = AnswerSet::new().with("b", "3");
        let merged = base.overlaid_with(&top);
        assert_eq!(merged.get("a"), Some(&AnswerValue::text("1")));
        assert_eq!(merged.get("b"), Some(&AnswerValue::text("3")));
    }

    #[test]
    fn mechanisms_default_empty() {
        assert!(AnswerSet::new().mechanisms().is_empty());
        let set = AnswerSet::new().with(MECHANISMS_QUESTION_ID, AnswerValue::list(["cli"]));
        assert_eq!(set.mechanisms(), vec!["cli".to_string()]);
    }

    proptest! {
        #[test]
        fn draft_json_keeps_recording_order(ids in proptest::collection::vec("[a-z]{1,8}", 1..12)) {
            let mut set = AnswerSet::new();
            for (n, id) in ids.iter().enumerate() {
                set.set(id.as_str(), n.to_string());
            }
            let json = serde_json::to_string(&set).unwrap();
            let back: AnswerSet = serde_json::from_str(&json).unwrap();
            let expected: Vec<_> = set.iter().map(|(id, _)| id.clone()).collect();
            let actual: Vec<_> = back.iter().map(|(id, _)| id.clone()).collect();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn overlay_keeps_every_key(
            base in proptest::collection::vec(("[a-d]", "[a-z]{0,3}"), 0..6),
            top in proptest::collection::vec(("[c-f]", "[a-z]{0,3}"), 0..6),
        ) {
            let base: AnswerSet = base.into_iter().map(|(k, v)| (QuestionId::new(k), AnswerValue::Text(v))).collect();
            let top: AnswerSet = top.into_iter().map(|(k, v)| (QuestionId::new(k), AnswerValue::Text(v))).collect();
            let merged = base.overlaid_with(&top);
            for (id, value) in top.iter() {
                prop_assert_eq!(merged.get(id.as_str()), Some(value));
            }
            for (id, _) in base.iter() {
                prop_assert!(merged.contains(id.as_str()));
            }
        }
    }
}
