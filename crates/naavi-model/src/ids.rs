//! Identifiers for sections, questions and questionnaire instances

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Numeric wizard step identifier (0..=12 for the built-in registry)
///
/// Ordering is numeric, which is what navigation relies on when it picks the
/// first invalid section.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SectionId(pub u32);

impl SectionId {
    #[inline]
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for SectionId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Question identifier, unique within a section
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for QuestionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for QuestionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for QuestionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for QuestionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for QuestionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two-part key identifying one questionnaire instance
///
/// A questionnaire is edited per (network function, version). The key also
/// determines the names under which drafts are persisted locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftKey {
    /// Network function name, e.g. `Nokia - 5G CHF ME`
    pub network_function: String,
    /// Version name, e.g. `v1.0.0`
    pub version: String,
}

impl DraftKey {
    #[inline]
    #[must_use]
    pub fn new(network_function: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            network_function: network_function.into(),
            version: version.into(),
        }
    }

    /// Storage key of the reconciled draft document: `formData-<nf>-<version>`
    #[must_use]
    pub fn form_data_key(&self) -> String {
        format!("formData-{}-{}", self.network_function, self.version)
    }

    /// Storage key of the raw per-section form state: `questionnaire-<nf>-<version>`
    #[must_use]
    pub fn questionnaire_key(&self) -> String {
        format!("questionnaire-{}-{}", self.network_function, self.version)
    }

    /// Prefixes of every storage key belonging to this network function
    ///
    /// Used to clear all persisted drafts after a final submission.
    #[must_use]
    pub fn network_function_prefixes(&self) -> [String; 2] {
        [
            format!("formData-{}", self.network_function),
            format!("questionnaire-{}", self.network_function),
        ]
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.network_function, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn storage_keys_follow_format() {
        let key = DraftKey::new("Nokia - 5G CHF ME", "v1.0.0");
        assert_eq!(key.form_data_key(), "formData-Nokia - 5G CHF ME-v1.0.0");
        assert_eq!(key.questionnaire_key(), "questionnaire-Nokia - 5G CHF ME-v1.0.0");
    }

    #[test]
    fn question_id_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(QuestionId::from("stepsCount"), 1);
        assert_eq!(map.get("stepsCount"), Some(&1));
    }

    #[test]
    fn section_ids_order_numerically() {
        let mut ids = vec![SectionId(10), SectionId(2), SectionId(7)];
        ids.sort();
        assert_eq!(ids, vec![SectionId(2), SectionId(7), SectionId(10)]);
    }
}
