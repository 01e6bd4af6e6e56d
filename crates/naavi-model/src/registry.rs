//! Schema Registry
//!
//! Holds the immutable per-section definitions. The built-in registry is
//! embedded as YAML and parsed once per process.

use crate::error::{SchemaError, SchemaResult};
use crate::ids::{QuestionId, SectionId};
use crate::schema::{QuestionType, SectionSchema};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

const BUILTIN_YAML: &str = include_str!("../schemas/questionnaire.yaml");

static BUILTIN: OnceCell<SchemaRegistry> = OnceCell::new();

#[derive(Debug, Deserialize, Serialize)]
struct RegistryDocument {
    sections: Vec<SectionSchema>,
}

/// Dependent question targeted by more than one radio of the same section
///
/// Visibility resolution is last-write-wins for these, so the later radio in
/// declaration order decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedTarget {
    /// Section containing the radios
    pub section: SectionId,
    /// The dependent question
    pub target: QuestionId,
    /// Radios referencing it, in declaration order
    pub radios: Vec<QuestionId>,
}

/// Immutable set of section schemas ordered by section id
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    sections: BTreeMap<SectionId, SectionSchema>,
}

impl SchemaRegistry {
    /// The built-in 13-section questionnaire
    ///
    /// # Errors
    /// Returns the lint error if the embedded document is inconsistent.
    pub fn builtin() -> SchemaResult<&'static SchemaRegistry> {
        BUILTIN.get_or_try_init(|| Self::from_yaml_str(BUILTIN_YAML))
    }

    /// Parse and lint a YAML registry document
    ///
    /// # Errors
    /// - `SchemaError::Parse` for malformed YAML
    /// - any lint error from [`SchemaRegistry::from_sections`]
    pub fn from_yaml_str(yaml: &str) -> SchemaResult<Self> {
        let doc: RegistryDocument = serde_yaml::from_str(yaml)?;
        Self::from_sections(doc.sections)
    }

    /// Build a registry from section definitions, checking consistency
    ///
    /// # Errors
    /// Duplicate ids or names, dangling conditional targets, radios without
    /// options and file questions without a limit are rejected.
    pub fn from_sections(sections: impl IntoIterator<Item = SectionSchema>) -> SchemaResult<Self> {
        let mut map = BTreeMap::new();
        let mut names = HashSet::new();

        for section in sections {
            lint_section(&section)?;
            if !names.insert(section.section_name.to_ascii_lowercase()) {
                return Err(SchemaError::DuplicateSectionName(section.section_name));
            }
            let id = section.section_id;
            if map.insert(id, section).is_some() {
                return Err(SchemaError::DuplicateSection(id));
            }
        }

        let registry = Self { sections: map };
        for shared in registry.shared_conditional_targets() {
            tracing::warn!(
                section = %shared.section,
                target = %shared.target,
                radios = ?shared.radios,
                "dependent question is targeted by several radios; the last one wins"
            );
        }
        Ok(registry)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: SectionId) -> Option<&SectionSchema> {
        self.sections.get(&id)
    }

    /// Section by storage name, case-insensitive
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&SectionSchema> {
        self.sections.values().find(|s| s.name_matches(name))
    }

    /// Sections in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &SectionSchema> {
        self.sections.values()
    }

    /// Section ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = SectionId> + '_ {
        self.sections.keys().copied()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Highest section id (the final wizard step)
    #[must_use]
    pub fn last_section(&self) -> Option<SectionId> {
        self.sections.keys().next_back().copied()
    }

    /// Section following `id`
    #[must_use]
    pub fn next_after(&self, id: SectionId) -> Option<SectionId> {
        self.sections
            .range((std::ops::Bound::Excluded(id), std::ops::Bound::Unbounded))
            .next()
            .map(|(k, _)| *k)
    }

    /// Section preceding `id`
    #[must_use]
    pub fn previous_before(&self, id: SectionId) -> Option<SectionId> {
        self.sections.range(..id).next_back().map(|(k, _)| *k)
    }

    /// Dependents referenced by more than one radio within a section
    #[must_use]
    pub fn shared_conditional_targets(&self) -> Vec<SharedTarget> {
        let mut shared = Vec::new();
        for section in self.sections.values() {
            let mut owners: BTreeMap<&QuestionId, Vec<QuestionId>> = BTreeMap::new();
            for radio in section.questions.iter().filter(|q| q.kind == QuestionType::Radio) {
                let distinct: HashSet<&QuestionId> = radio.all_dependents().collect();
                for target in distinct {
                    owners.entry(target).or_default().push(radio.id.clone());
                }
            }
            for (target, radios) in owners {
                if radios.len() > 1 {
                    shared.push(SharedTarget {
                        section: section.section_id,
                        target: target.clone(),
                        radios,
                    });
                }
            }
        }
        shared
    }

    /// Serialize back to the YAML document shape
    ///
    /// # Errors
    /// Propagates YAML serialization failures.
    pub fn to_yaml(&self) -> SchemaResult<String> {
        let doc = RegistryDocument {
            sections: self.sections.values().cloned().collect(),
        };
        Ok(serde_yaml::to_string(&doc)?)
    }
}

fn lint_section(section: &SectionSchema) -> SchemaResult<()> {
    let mut seen: HashMap<&str, ()> = HashMap::new();
    for q in &section.questions {
        if seen.insert(q.id.as_str(), ()).is_some() {
            return Err(SchemaError::DuplicateQuestion {
                section: section.section_id,
                question: q.id.clone(),
            });
        }
    }

    for q in &section.questions {
        if q.kind == QuestionType::Radio && q.options.is_empty() {
            return Err(SchemaError::RadioWithoutOptions {
                section: section.section_id,
                question: q.id.clone(),
            });
        }
        if q.kind == QuestionType::File && q.max_files.unwrap_or(0) == 0 {
            return Err(SchemaError::MissingFileLimit {
                section: section.section_id,
                question: q.id.clone(),
            });
        }
        for (option, dependents) in &q.conditional_questions {
            if !q.options.is_empty() && !q.options.iter().any(|o| &o.value == option) {
                return Err(SchemaError::UnknownBranchOption {
                    section: section.section_id,
                    question: q.id.clone(),
                    option: option.clone(),
                });
            }
            if let Some(target) = dependents.iter().find(|d| !seen.contains_key(d.as_str())) {
                return Err(SchemaError::UnknownConditionalTarget {
                    section: section.section_id,
                    source_question: q.id.clone(),
                    target: target.clone(),
                });
            }
        }
    }
    Ok(())
}
