//! Progress metrics
//!
//! Completion and automation figures over saved questionnaires, as shown on
//! the dashboard.

use crate::api::{NetworkFunctionInfo, QuestionnaireStatus};
use naavi_draft::{DraftDocument, DraftSection};
use naavi_model::{AnswerValue, SchemaRegistry, SectionId};
use serde::{Deserialize, Serialize};

/// Completion percentage at which a section counts as completed
pub const COMPLETED_THRESHOLD: u8 = 90;

/// Question holding the automated step count
pub const AUTOMATED_STEPS_QUESTION: &str = "automatedStepsCount";

/// Question holding a section's total step count
#[must_use]
pub fn steps_question(section_name: &str) -> &'static str {
    match section_name {
        "install" => "installSteps",
        "postinstall" => "postInstallSteps",
        _ => "stepsCount",
    }
}

/// Status of one section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionStatus {
    /// No answered question
    NotStarted,
    /// Some answered questions
    InProgress,
    /// At least [`COMPLETED_THRESHOLD`] percent answered
    Completed,
}

/// Rounded share of answered questions; 0 for a section without questions
#[must_use]
pub fn section_completion(section: &DraftSection) -> u8 {
    let total = section.questions.len();
    if total == 0 {
        return 0;
    }
    let answered = section
        .questions
        .iter()
        .filter(|q| q.answer.is_answered())
        .count();
    percentage(answered as u64, total as u64)
}

/// Status derived from [`section_completion`]
#[must_use]
pub fn section_status(section: &DraftSection) -> SectionStatus {
    if section.questions.is_empty() {
        return SectionStatus::NotStarted;
    }
    match section_completion(section) {
        pct if pct >= COMPLETED_THRESHOLD => SectionStatus::Completed,
        0 => SectionStatus::NotStarted,
        _ => SectionStatus::InProgress,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn percentage(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((part.min(whole) as f64 / whole as f64) * 100.0).round() as u8
}

/// Manual versus automated steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationMetrics {
    /// Reported steps
    pub total_steps: u64,
    /// Automated steps, capped at the total
    pub automated_steps: u64,
}

impl AutomationMetrics {
    /// Metrics of one saved section
    #[must_use]
    pub fn for_section(section: &DraftSection) -> Self {
        let answers = section.answers();
        let count = |id: &str| answers.get(id).and_then(AnswerValue::as_count).unwrap_or(0);
        let total_steps = count(steps_question(&section.section_name.to_lowercase()));
        Self {
            total_steps,
            automated_steps: count(AUTOMATED_STEPS_QUESTION).min(total_steps),
        }
    }

    /// Steps not automated
    #[must_use]
    pub fn manual_steps(&self) -> u64 {
        self.total_steps - self.automated_steps
    }

    /// Rounded automated share; 0 without steps
    #[must_use]
    pub fn automation_percentage(&self) -> u8 {
        percentage(self.automated_steps, self.total_steps)
    }
}

impl std::ops::Add for AutomationMetrics {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            total_steps: self.total_steps + other.total_steps,
            automated_steps: self.automated_steps + other.automated_steps,
        }
    }
}

impl std::iter::Sum for AutomationMetrics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, m| acc + m)
    }
}

/// Progress of one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionProgress {
    /// Section
    pub section_id: SectionId,
    /// Display title
    pub title: String,
    /// Completion percentage
    pub completion: u8,
    /// Status
    pub status: SectionStatus,
    /// Automation figures
    pub automation: AutomationMetrics,
}

/// Progress of a whole questionnaire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireProgress {
    /// Per-section progress in registry order
    pub sections: Vec<SectionProgress>,
}

impl QuestionnaireProgress {
    /// Progress of `document` over every registry section
    ///
    /// Sections missing from the document count as not started.
    #[must_use]
    pub fn compute(registry: &SchemaRegistry, document: &DraftDocument) -> Self {
        let sections = registry
            .iter()
            .map(|schema| {
                let saved = document.section(&schema.section_name);
                SectionProgress {
                    section_id: schema.section_id,
                    title: schema.section_title.clone(),
                    completion: saved.map_or(0, section_completion),
                    status: saved.map_or(SectionStatus::NotStarted, section_status),
                    automation: saved.map(AutomationMetrics::for_section).unwrap_or_default(),
                }
            })
            .collect();
        Self { sections }
    }

    /// Average section completion
    #[must_use]
    pub fn completion(&self) -> u8 {
        let total: u64 = self.sections.iter().map(|s| u64::from(s.completion)).sum();
        let count = self.sections.len() as u64;
        if count == 0 {
            return 0;
        }
        percentage(total, count * 100)
    }

    /// Share of completed sections
    #[must_use]
    pub fn completed_share(&self) -> u8 {
        let completed = self
            .sections
            .iter()
            .filter(|s| s.status == SectionStatus::Completed)
            .count();
        percentage(completed as u64, self.sections.len() as u64)
    }

    /// Automation over all sections
    #[must_use]
    pub fn automation(&self) -> AutomationMetrics {
        self.sections.iter().map(|s| s.automation).sum()
    }
}

/// Number of versions per status bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStatusCounts {
    /// No recorded status, or "Not Started"
    pub not_started: usize,
    /// Saved as draft
    pub in_progress: usize,
    /// Submitted
    pub completed: usize,
}

impl VersionStatusCounts {
    /// Bucket every version of every network function
    #[must_use]
    pub fn tally(functions: &[NetworkFunctionInfo]) -> Self {
        let mut counts = Self::default();
        for version in functions.iter().flat_map(|nf| &nf.versions) {
            match version.status() {
                Some(QuestionnaireStatus::Submitted) => counts.completed += 1,
                Some(QuestionnaireStatus::InProgress) => counts.in_progress += 1,
                Some(QuestionnaireStatus::NotStarted) | None => counts.not_started += 1,
            }
        }
        counts
    }

    /// All versions
    #[must_use]
    pub fn total(&self) -> usize {
        self.not_started + self.in_progress + self.completed
    }
}
