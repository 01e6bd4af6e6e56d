//! Cross-Section Aggregator
//!
//! Runs the field validator over every section of a registry and collects the
//! sections that still have unsatisfied fields.

use crate::validator::{AnswerSources, FieldValidator};
use naavi_model::{QuestionId, SchemaRegistry, SectionId, SectionSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Questionnaire-wide validation outcome
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// No section has invalid fields
    pub is_valid: bool,
    /// Section id -> invalid question ids; sections without failures are absent
    pub invalid_sections: BTreeMap<SectionId, Vec<QuestionId>>,
}

impl ValidationSummary {
    /// Build from the invalid-section map
    #[must_use]
    pub fn from_invalid(invalid_sections: BTreeMap<SectionId, Vec<QuestionId>>) -> Self {
        Self {
            is_valid: invalid_sections.is_empty(),
            invalid_sections,
        }
    }

    /// Lowest invalid section id, the navigation target after a failed submit
    #[must_use]
    pub fn first_invalid_section(&self) -> Option<SectionId> {
        self.invalid_sections.keys().next().copied()
    }

    /// Invalid fields of one section (empty when the section is valid)
    #[must_use]
    pub fn invalid_fields(&self, section: SectionId) -> &[QuestionId] {
        self.invalid_sections
            .get(&section)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of missing fields across all sections
    #[must_use]
    pub fn total_missing_fields(&self) -> usize {
        self.invalid_sections.values().map(Vec::len).sum()
    }

    /// Number of sections with failures
    #[inline]
    #[must_use]
    pub fn invalid_section_count(&self) -> usize {
        self.invalid_sections.len()
    }
}

/// Validates all sections independently
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossSectionAggregator {
    validator: FieldValidator,
}

impl CrossSectionAggregator {
    /// Create aggregator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate every registry section with prebuilt sources
    ///
    /// Sections missing from `sources` are validated against no data.
    #[must_use]
    pub fn validate_all(
        &self,
        registry: &SchemaRegistry,
        sources: &BTreeMap<SectionId, AnswerSources<'_>>,
    ) -> ValidationSummary {
        self.validate_all_with(registry, |section| {
            sources
                .get(&section.section_id)
                .copied()
                .unwrap_or_default()
        })
    }

    /// Validate every registry section, building sources on demand
    pub fn validate_all_with<'a, F>(
        &self,
        registry: &SchemaRegistry,
        mut sources_for: F,
    ) -> ValidationSummary
    where
        F: FnMut(&SectionSchema) -> AnswerSources<'a>,
    {
        let mut invalid_sections = BTreeMap::new();
        for section in registry.iter() {
            let sources = sources_for(section);
            let result = self
                .validator
                .validate_section(section.section_id, section, &sources);
            if !result.is_valid {
                invalid_sections.insert(section.section_id, result.invalid_field_ids);
            }
        }

        let summary = ValidationSummary::from_invalid(invalid_sections);
        tracing::debug!(
            sections = registry.len(),
            invalid_sections = summary.invalid_section_count(),
            missing = summary.total_missing_fields(),
            "validated all sections"
        );
        summary
    }
}

/// Validate all sections with a default aggregator
#[inline]
#[must_use]
pub fn validate_all(
    registry: &SchemaRegistry,
    sources: &BTreeMap<SectionId, AnswerSources<'_>>,
) -> ValidationSummary {
    CrossSectionAggregator::new().validate_all(registry, sources)
}
