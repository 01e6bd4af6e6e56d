//! Visibility Resolver
//!
//! Computes which questions of a section are currently shown, given the
//! section's answers and the selected validation mechanisms.

use indexmap::IndexMap;
use naavi_model::{AnswerSet, QuestionId, QuestionType, SectionSchema, OTHER_OPTION};
use serde::Serialize;

/// Per-question visibility of one section
///
/// Every question of the schema has an entry. Ids that are not part of the
/// schema report as hidden.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VisibilityMap {
    visible: IndexMap<QuestionId, bool>,
}

impl VisibilityMap {
    /// Whether a question is shown
    #[inline]
    #[must_use]
    pub fn is_visible(&self, id: &str) -> bool {
        self.visible.get(id).copied().unwrap_or(false)
    }

    /// Force a question's visibility
    pub fn set(&mut self, id: &QuestionId, visible: bool) {
        if let Some(slot) = self.visible.get_mut(id.as_str()) {
            *slot = visible;
        } else {
            self.visible.insert(id.clone(), visible);
        }
    }

    /// Shown question ids, in schema order
    pub fn visible_ids(&self) -> impl Iterator<Item = &QuestionId> {
        self.visible.iter().filter(|(_, v)| **v).map(|(k, _)| k)
    }

    /// Iterate all entries in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, bool)> {
        self.visible.iter().map(|(k, v)| (k, *v))
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    /// No entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }
}

/// Stateless conditional-visibility evaluator
///
/// Deterministic for identical (schema, answers, mechanisms); reads nothing
/// else.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityResolver;

impl VisibilityResolver {
    /// Create resolver
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolve visibility for a section
    ///
    /// 1. Every question starts as `!hidden`.
    /// 2. Each radio with branches hides all of its dependents, then reveals the
    ///    branch of the selected option. Radios are processed in declaration
    ///    order, so a later radio overrides an earlier one for a shared
    ///    dependent.
    /// 3. A visible checkbox with an `other` branch reveals it when `other` is
    ///    among `mechanisms`. Runs after every radio.
    #[must_use]
    pub fn resolve(
        &self,
        schema: &SectionSchema,
        answers: &AnswerSet,
        mechanisms: &[String],
    ) -> VisibilityMap {
        let mut map = VisibilityMap {
            visible: schema
                .questions
                .iter()
                .map(|q| (q.id.clone(), !q.hidden))
                .collect(),
        };

        let other_selected = mechanisms.iter().any(|m| m == OTHER_OPTION);

        let branching = || {
            schema
                .questions
                .iter()
                .filter(|q| !q.conditional_questions.is_empty())
        };

        for question in branching().filter(|q| q.kind == QuestionType::Radio) {
            for dependent in question.all_dependents() {
                map.set(dependent, false);
            }

            let selected = answers
                .get(question.id.as_str())
                .filter(|value| !value.is_empty())
                .map(|value| value.as_text());

            if let Some(branch) = selected
                .as_deref()
                .and_then(|option| question.conditional_questions.get(option))
            {
                for dependent in branch {
                    map.set(dependent, true);
                }
            }
        }

        // A checkbox hidden by a radio cannot reveal its own branch.
        if mechanisms.iter().any(|m| m == OTHER_OPTION) {
            for question in branching().filter(|q| q.kind == QuestionType::Checkbox) {
                if !map.is_visible(question.id.as_str()) {
                    continue;
                }
                if let Some(branch) = question.conditional_questions.get(OTHER_OPTION) {
                    for dependent in branch {
                        map.set(dependent, true);
                    }
                }
            }
        }

        map
    }
}

/// Resolve visibility with a default resolver
#[inline]
#[must_use]
pub fn resolve_visibility(
    schema: &SectionSchema,
    answers: &AnswerSet,
    mechanisms: &[String],
) -> VisibilityMap {
    VisibilityResolver::new().resolve(schema, answers, mechanisms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use naavi_model::{QuestionSchema, SectionId};
    use proptest::prelude::*;

    fn section() -> SectionSchema {
        SectionSchema::new(
            SectionId(0),
            "healthcheck",
            vec![
                QuestionSchema::new("performed", QuestionType::Radio)
                    .required()
                    .with_options(["yes", "no", "partial"])
                    .with_branch("yes", ["steps", "notes"])
                    .with_branch("no", ["reason", "notes"])
                    .with_branch("partial", ["steps"]),
                QuestionSchema::new("steps", QuestionType::Number).required().hidden(),
                QuestionSchema::new("reason", QuestionType::Textarea).required().hidden(),
                QuestionSchema::new("notes", QuestionType::Textarea).hidden(),
                QuestionSchema::new("validationMechanisms", QuestionType::Checkbox)
                    .with_options(["cli", "other"])
                    .with_branch("other", ["otherMechanism"]),
                QuestionSchema::new("otherMechanism", QuestionType::Text).hidden(),
                QuestionSchema::new("always", QuestionType::Text),
            ],
        )
    }

    #[test]
    fn defaults_follow_hidden_flag() {
        let map = resolve_visibility(&section(), &AnswerSet::new(), &[]);
        assert!(map.is_visible("performed"));
        assert!(map.is_visible("always"));
        assert!(!map.is_visible("steps"));
        assert!(!map.is_visible("otherMechanism"));
        assert!(!map.is_visible("not-in-schema"));
        assert_eq!(map.len(), 7);
    }

    #[test]
    fn switching_radio_option_swaps_dependents() {
        let schema = section();
        let yes = resolve_visibility(&schema, &AnswerSet::new().with("performed", "yes"), &[]);
        assert!(yes.is_visible("steps"));
        assert!(yes.is_visible("notes"));
        assert!(!yes.is_visible("reason"));

        let no = resolve_visibility(&schema, &AnswerSet::new().with("performed", "no"), &[]);
        assert!(!no.is_visible("steps"), "exclusive dependent of 'yes' is hidden");
        assert!(no.is_visible("reason"));
        assert!(no.is_visible("notes"), "shared dependent stays visible");
    }

    #[test]
    fn unknown_or_empty_selection_hides_all_dependents() {
        let schema = section();
        for answer in ["", "maybe"] {
            let map = resolve_visibility(&schema, &AnswerSet::new().with("performed", answer), &[]);
            assert!(!map.is_visible("steps"));
            assert!(!map.is_visible("reason"));
            assert!(!map.is_visible("notes"));
        }
    }

    #[test]
    fn other_mechanism_revealed_by_selection() {
        let schema = section();
        let without = resolve_visibility(&schema, &AnswerSet::new(), &["cli".to_string()]);
        assert!(!without.is_visible("otherMechanism"));

        let with = resolve_visibility(
            &schema,
            &AnswerSet::new(),
            &["cli".to_string(), "other".to_string()],
        );
        assert!(with.is_visible("otherMechanism"));
    }

    #[test]
    fn hidden_mechanisms_group_keeps_other_hidden() {
        let schema = SectionSchema::new(
            SectionId(0),
            "healthcheck",
            vec![
                QuestionSchema::new("performed", QuestionType::Radio)
                    .with_options(["yes", "no"])
                    .with_branch("yes", ["validationMechanisms"])
                    .with_branch("no", ["reason"]),
                QuestionSchema::new("reason", QuestionType::Textarea).hidden(),
                QuestionSchema::new("validationMechanisms", QuestionType::Checkbox)
                    .hidden()
                    .with_options(["cli", "other"])
                    .with_branch("other", ["otherMechanism"]),
                QuestionSchema::new("otherMechanism", QuestionType::Text).hidden(),
            ],
        );
        let mechanisms = vec!["other".to_string()];

        let yes = resolve_visibility(&schema, &AnswerSet::new().with("performed", "yes"), &mechanisms);
        assert!(yes.is_visible("otherMechanism"));

        let no = resolve_visibility(&schema, &AnswerSet::new().with("performed", "no"), &mechanisms);
        assert!(!no.is_visible("validationMechanisms"));
        assert!(!no.is_visible("otherMechanism"));
    }

    #[test]
    fn later_radio_wins_for_shared_dependent() {
        let schema = SectionSchema::new(
            SectionId(1),
            "preinstall",
            vec![
                QuestionSchema::new("first", QuestionType::Radio)
                    .with_options(["yes", "no"])
                    .with_branch("yes", ["shared"]),
                QuestionSchema::new("second", QuestionType::Radio)
                    .with_options(["yes", "no"])
                    .with_branch("yes", ["shared"]),
                QuestionSchema::new("shared", QuestionType::Text).hidden(),
            ],
        );
        let answers = AnswerSet::new().with("first", "yes").with("second", "no");
        let map = resolve_visibility(&schema, &answers, &[]);
        assert!(!map.is_visible("shared"));

        let answers = AnswerSet::new().with("first", "no").with("second", "yes");
        assert!(resolve_visibility(&schema, &answers, &[]).is_visible("shared"));
    }

    #[test]
    fn visible_ids_in_schema_order() {
        let map = resolve_visibility(&section(), &AnswerSet::new().with("performed", "partial"), &[]);
        let ids: Vec<&str> = map.visible_ids().map(QuestionId::as_str).collect();
        assert_eq!(ids, vec!["performed", "steps", "validationMechanisms", "always"]);
    }

    proptest! {
        #[test]
        fn prop_resolution_is_idempotent(
            choice in prop_oneof![Just(""), Just("yes"), Just("no"), Just("partial"), Just("x")],
            mechanisms in proptest::collection::vec(
                prop_oneof![Just("cli".to_string()), Just("other".to_string())], 0..3),
        ) {
            let schema = section();
            let answers = AnswerSet::new().with("performed", choice);
            let first = resolve_visibility(&schema, &answers, &mechanisms);
            let second = resolve_visibility(&schema, &answers, &mechanisms);
            prop_assert_eq!(first, second);
        }
    }
}
