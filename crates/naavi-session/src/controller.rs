//! Wizard navigation
//!
//! The wizard shell drives the active section through [`SectionController`]
//! and never reaches into the section's state directly. Every navigation
//! awaits the section's save first; navigation proceeds whether the save
//! succeeded or failed.

use crate::error::{SessionError, SessionResult};
use crate::notify::{Notification, Notifier};
use async_trait::async_trait;
use naavi_model::{QuestionId, SchemaRegistry, SectionId};
use naavi_validation::ValidationSummary;
use std::sync::Arc;

/// Operations the wizard shell invokes on the section form
#[async_trait]
pub trait SectionController: Send + Sync {
    /// Save the current answers as a draft
    async fn save(&self) -> SessionResult<()>;

    /// Validate every section
    async fn validate_all(&self) -> ValidationSummary;

    /// Mark fields of the active section as invalid
    fn set_invalid_fields(&self, ids: Vec<QuestionId>);

    /// Section currently shown
    fn active_section(&self) -> SectionId;

    /// Show another section
    fn activate(&self, section: SectionId);

    /// Send the final submission
    async fn finalize(&self) -> SessionResult<()>;
}

/// Result of a submit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Sent as final
    Submitted,
    /// Blocked by missing fields
    Incomplete(ValidationSummary),
}

/// Orders save, navigation and submission for a [`SectionController`]
pub struct WizardNavigator<C: ?Sized> {
    controller: Arc<C>,
    registry: Arc<SchemaRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl<C: SectionController + ?Sized> WizardNavigator<C> {
    /// Navigator over `controller`
    #[must_use]
    pub fn new(
        controller: Arc<C>,
        registry: Arc<SchemaRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            controller,
            registry,
            notifier,
        }
    }

    /// Controlled section form
    #[must_use]
    pub fn controller(&self) -> &Arc<C> {
        &self.controller
    }

    /// Section currently shown
    #[must_use]
    pub fn current(&self) -> SectionId {
        self.controller.active_section()
    }

    /// Save, then move to the following section
    ///
    /// Returns `None` on the last section, without saving.
    pub async fn next(&self) -> Option<SectionId> {
        let target = self.registry.next_after(self.current())?;
        self.navigate(target).await;
        Some(target)
    }

    /// Save, then move to the preceding section
    ///
    /// Returns `None` on the first section, without saving.
    pub async fn previous(&self) -> Option<SectionId> {
        let target = self.registry.previous_before(self.current())?;
        self.navigate(target).await;
        Some(target)
    }

    /// Save, then jump to `target`
    ///
    /// # Errors
    /// Returns `SessionError::UnknownSection` for ids outside the registry.
    pub async fn go_to(&self, target: SectionId) -> SessionResult<SectionId> {
        if self.registry.get(target).is_none() {
            return Err(SessionError::UnknownSection(target));
        }
        self.navigate(target).await;
        Ok(target)
    }

    async fn navigate(&self, target: SectionId) {
        let from = self.current();
        if let Err(e) = self.controller.save().await {
            tracing::warn!(%from, %target, error = %e, "save before navigation failed");
        }
        self.controller.activate(target);
        tracing::debug!(%from, %target, "navigated");
    }

    /// Validate everything and submit when complete
    ///
    /// When fields are missing, the user is told how many, the first invalid
    /// section becomes active and its invalid fields are marked.
    ///
    /// # Errors
    /// Propagates the controller's finalize error; local drafts stay intact.
    pub async fn submit(&self) -> SessionResult<SubmitOutcome> {
        let summary = self.controller.validate_all().await;
        let Some(first) = summary.first_invalid_section() else {
            self.controller.finalize().await?;
            return Ok(SubmitOutcome::Submitted);
        };

        self.notifier.notify(Notification::error(format!(
            "Please fill in all required fields ({} missing across {} sections)",
            summary.total_missing_fields(),
            summary.invalid_section_count()
        )));
        tracing::info!(
            first_invalid = %first,
            sections = summary.invalid_section_count(),
            "submission blocked by missing fields"
        );

        self.controller.activate(first);
        self.controller
            .set_invalid_fields(summary.invalid_fields(first).to_vec());
        Ok(SubmitOutcome::Incomplete(summary))
    }
}
