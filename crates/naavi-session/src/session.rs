//! Questionnaire session
//!
//! A [`QuestionnaireSession`] owns the editable state of one questionnaire
//! instance (network function, version):
//!
//! - one [`AnswerSet`] and one [`VisibilityMap`] per section, always
//!   recomputed together
//! - the files attached in any tier, reconciled into [`UploadedFileRef`]s
//! - the invalid fields shown on the active section
//!
//! Edits schedule a debounced validation pass and a debounced local save.
//! Backend failures are turned into notifications at the call site and
//! returned as errors; they never poison the session.

use crate::api::{
    PayloadSection, QuestionnaireApi, QuestionnairePayload, QuestionnaireStatus, UploadRequest,
};
use crate::config::SessionConfig;
use crate::controller::{SectionController, WizardNavigator};
use crate::error::{
    ApiError, BusyOperation, FileConstraintViolation, SessionError, SessionResult,
};
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::remote::RemoteSnapshots;
use crate::scheduler::Debouncer;
use async_trait::async_trait;
use naavi_draft::{
    DraftDocument, DraftReconciler, DraftRepository, DraftSection, DraftSources, FileDraftStore,
    FormState,
};
use naavi_model::{
    AnswerSet, AnswerValue, DraftKey, FileRecord, QuestionId, QuestionSchema, QuestionType,
    SchemaRegistry, SectionId, SectionSchema, UploadedFileRef, MECHANISMS_QUESTION_ID,
};
use naavi_validation::{
    AnswerSources, CrossSectionAggregator, FieldValidator, ValidationResult, ValidationSummary,
    VisibilityMap, VisibilityResolver,
};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// File selected for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    /// File name
    pub filename: String,
    /// File content
    pub content: Vec<u8>,
}

impl PendingUpload {
    /// File with content
    #[must_use]
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// Content size in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// File the backend rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    /// File name
    pub filename: String,
    /// Backend error
    pub error: ApiError,
}

/// Outcome of an upload batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Files now attached
    pub uploaded: Vec<UploadedFileRef>,
    /// Files that failed
    pub failed: Vec<FailedUpload>,
}

impl UploadReport {
    /// Every file was uploaded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn notification(&self) -> Option<Notification> {
        let ok = self.uploaded.len();
        let failed = self.failed.len();
        let failed_names = || {
            let names: Vec<&str> = self.failed.iter().map(|f| f.filename.as_str()).collect();
            format!("Failed files: {}", names.join(", "))
        };
        match (ok, failed) {
            (0, 0) => None,
            (ok, 0) => Some(Notification::success(format!(
                "{ok} file(s) uploaded successfully"
            ))),
            (0, failed) => Some(
                Notification::error(format!("Failed to upload {failed} files"))
                    .with_details(failed_names()),
            ),
            (ok, failed) => Some(
                Notification::warning(format!(
                    "{ok} files uploaded successfully. {failed} files failed."
                ))
                .with_details(failed_names()),
            ),
        }
    }
}

/// Answers and derived visibility of one section
#[derive(Debug, Clone)]
struct SectionRuntime {
    answers: AnswerSet,
    visibility: VisibilityMap,
    initialized: bool,
}

impl SectionRuntime {
    fn new(schema: &SectionSchema, answers: AnswerSet, initialized: bool) -> Self {
        let visibility =
            VisibilityResolver::new().resolve(schema, &answers, &answers.mechanisms());
        Self {
            answers,
            visibility,
            initialized,
        }
    }

    fn edit(&mut self, schema: &SectionSchema, f: impl FnOnce(&mut AnswerSet)) {
        f(&mut self.answers);
        self.initialized = true;
        self.visibility =
            VisibilityResolver::new().resolve(schema, &self.answers, &self.answers.mechanisms());
    }

    fn replace(&mut self, schema: &SectionSchema, answers: AnswerSet) {
        *self = Self::new(schema, answers, true);
    }
}

/// Locally persisted tier, split by section
#[derive(Debug, Clone, Default)]
struct PersistedTier {
    answers: BTreeMap<SectionId, AnswerSet>,
    files: BTreeMap<SectionId, Vec<FileRecord>>,
}

impl PersistedTier {
    fn from_document(registry: &SchemaRegistry, document: &DraftDocument) -> Self {
        let mut tier = Self::default();
        for section in &document.sections {
            let Some(schema) = registry.by_name(&section.section_name) else {
                continue;
            };
            tier.answers.insert(schema.section_id, section.answers());
            tier.files.insert(schema.section_id, section.files.clone());
        }
        tier
    }
}

#[derive(Debug)]
struct SessionState {
    active: SectionId,
    sections: BTreeMap<SectionId, SectionRuntime>,
    files: Vec<UploadedFileRef>,
    persisted: PersistedTier,
    remote_files: BTreeMap<SectionId, Vec<FileRecord>>,
    invalid_fields: Vec<QuestionId>,
    summary: Option<ValidationSummary>,
    uploaded_bytes: u64,
}

impl SessionState {
    fn sources(&self, section: SectionId) -> AnswerSources<'_> {
        let mut sources = AnswerSources::empty().with_live_files(&self.files);
        if let Some(runtime) = self.sections.get(&section) {
            sources = sources.with_live(&runtime.answers);
        }
        if let Some(answers) = self.persisted.answers.get(&section) {
            sources = sources.with_persisted(answers);
        }
        if let Some(files) = self.persisted.files.get(&section) {
            sources = sources.with_persisted_files(files);
        }
        if let Some(files) = self.remote_files.get(&section) {
            sources = sources.with_remote_files(files);
        }
        sources
    }

    fn forget_file(&mut self, section: SectionId, name: &str) {
        for tier in [
            self.persisted.files.get_mut(&section),
            self.remote_files.get_mut(&section),
        ]
        .into_iter()
        .flatten()
        {
            tier.retain(|f| f.filename != name);
        }
    }
}

#[derive(Debug, Default)]
struct BusyFlags {
    uploading: AtomicBool,
    saving: AtomicBool,
    submitting: AtomicBool,
}

impl BusyFlags {
    fn flag(&self, op: BusyOperation) -> &AtomicBool {
        match op {
            BusyOperation::Uploading => &self.uploading,
            BusyOperation::Saving => &self.saving,
            BusyOperation::Submitting => &self.submitting,
        }
    }

    fn acquire(&self, op: BusyOperation) -> SessionResult<BusyGuard<'_>> {
        let flag = self.flag(op);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::Busy(op))?;
        Ok(BusyGuard { flag })
    }
}

struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Builder for [`QuestionnaireSession`]
pub struct SessionBuilder {
    key: DraftKey,
    api: Arc<dyn QuestionnaireApi>,
    registry: Option<Arc<SchemaRegistry>>,
    drafts: Option<DraftRepository>,
    notifier: Option<Arc<dyn Notifier>>,
    remote: Option<RemoteSnapshots>,
    config: SessionConfig,
}

impl SessionBuilder {
    /// Builder for `key` against `api`
    #[must_use]
    pub fn new(key: DraftKey, api: Arc<dyn QuestionnaireApi>) -> Self {
        Self {
            key,
            api,
            registry: None,
            drafts: None,
            notifier: None,
            remote: None,
            config: SessionConfig::default(),
        }
    }

    /// With schema registry (default: built-in)
    #[inline]
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// With draft repository (default: from `config.draft_dir`)
    #[inline]
    #[must_use]
    pub fn with_drafts(mut self, drafts: DraftRepository) -> Self {
        self.drafts = Some(drafts);
        self
    }

    /// With notification sink (default: log only)
    #[inline]
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Share a remote snapshot cache between sessions
    #[inline]
    #[must_use]
    pub fn with_remote(mut self, remote: RemoteSnapshots) -> Self {
        self.remote = Some(remote);
        self
    }

    /// With configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Hydrate every section and open the session
    ///
    /// A failed remote fetch is reported and hydration continues from the
    /// local tiers.
    ///
    /// # Errors
    /// Returns an error if the built-in schema is invalid or the draft
    /// directory cannot be created.
    pub async fn open(self) -> SessionResult<Arc<QuestionnaireSession>> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => Arc::new(SchemaRegistry::builtin()?.clone()),
        };
        let drafts = match (self.drafts, &self.config.draft_dir) {
            (Some(drafts), _) => drafts,
            (None, Some(dir)) => DraftRepository::new(Arc::new(FileDraftStore::open(dir).await?)),
            (None, None) => DraftRepository::in_memory(),
        };
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let remote = self
            .remote
            .unwrap_or_else(|| RemoteSnapshots::new(self.api, &self.config));

        let session = QuestionnaireSession::hydrate(
            self.key,
            registry,
            drafts,
            notifier,
            remote,
            self.config,
        )
        .await;
        let session = Arc::new(session);
        if let Err(e) = session.persist_local().await {
            tracing::warn!(key = %session.key, error = %e, "failed to persist hydrated draft");
        }
        Ok(session)
    }
}

/// Editable state of one questionnaire instance
pub struct QuestionnaireSession {
    key: DraftKey,
    registry: Arc<SchemaRegistry>,
    config: SessionConfig,
    remote: RemoteSnapshots,
    drafts: DraftRepository,
    notifier: Arc<dyn Notifier>,
    state: RwLock<SessionState>,
    busy: BusyFlags,
    closed: AtomicBool,
    validation: Debouncer,
    autosave: Debouncer,
    validator: FieldValidator,
    aggregator: CrossSectionAggregator,
}

impl std::fmt::Debug for QuestionnaireSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionnaireSession")
            .field("key", &self.key)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl QuestionnaireSession {
    /// Start building a session
    #[must_use]
    pub fn builder(key: DraftKey, api: Arc<dyn QuestionnaireApi>) -> SessionBuilder {
        SessionBuilder::new(key, api)
    }

    async fn hydrate(
        key: DraftKey,
        registry: Arc<SchemaRegistry>,
        drafts: DraftRepository,
        notifier: Arc<dyn Notifier>,
        remote: RemoteSnapshots,
        config: SessionConfig,
    ) -> Self {
        let form_state = drafts.load_form_state(&key).await.unwrap_or_default();
        let persisted = drafts.load_document(&key).await;
        let remote_doc = match remote.fetch(&key).await {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to fetch saved questionnaire");
                notifier.notify(Notification::error(format!(
                    "Failed to load saved questionnaire: {e}"
                )));
                None
            }
        };

        let reconciler = DraftReconciler::new();
        let mut sections = BTreeMap::new();
        let mut files = Vec::new();
        let mut remote_files = BTreeMap::new();
        for schema in registry.iter() {
            let live = form_state.section_answers(schema.section_id);
            let mut sources = DraftSources::default();
            if let Some(live) = &live {
                sources = sources.with_live(live);
            }
            if let Some(persisted) = &persisted {
                sources = sources.with_persisted(persisted);
            }
            if let Some(remote) = &remote_doc {
                sources = sources.with_remote(remote);
            }
            let answers = reconciler.hydrate(schema, &sources);

            let section_remote_files = remote_doc
                .as_ref()
                .map(|d| d.files_for(&schema.section_name).to_vec())
                .unwrap_or_default();
            let section_persisted_files = persisted
                .as_ref()
                .map(|d| d.files_for(&schema.section_name))
                .unwrap_or_default();
            files.extend(reconciler.reconcile_files(
                schema,
                &section_remote_files,
                section_persisted_files,
                &[],
            ));
            if !section_remote_files.is_empty() {
                remote_files.insert(schema.section_id, section_remote_files);
            }

            sections.insert(
                schema.section_id,
                SectionRuntime::new(schema, answers, live.is_some()),
            );
        }

        let persisted = persisted
            .map(|doc| PersistedTier::from_document(&registry, &doc))
            .unwrap_or_default();
        let active = registry.ids().next().unwrap_or_default();

        tracing::info!(
            key = %key,
            sections = sections.len(),
            initialized = form_state.initialized_sections().len(),
            files = files.len(),
            remote = remote_doc.is_some(),
            "hydrated questionnaire session"
        );

        Self {
            validation: Debouncer::new(config.validation_debounce()),
            autosave: Debouncer::new(config.autosave_debounce()),
            key,
            registry,
            config,
            remote,
            drafts,
            notifier,
            state: RwLock::new(SessionState {
                active,
                sections,
                files,
                persisted,
                remote_files,
                invalid_fields: Vec::new(),
                summary: None,
                uploaded_bytes: 0,
            }),
            busy: BusyFlags::default(),
            closed: AtomicBool::new(false),
            validator: FieldValidator::new(),
            aggregator: CrossSectionAggregator::new(),
        }
    }

    /// Questionnaire key
    #[must_use]
    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    /// Schema registry
    #[must_use]
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Navigator driving this session
    #[must_use]
    pub fn navigator(self: &Arc<Self>) -> WizardNavigator<Self> {
        WizardNavigator::new(
            Arc::clone(self),
            Arc::clone(&self.registry),
            Arc::clone(&self.notifier),
        )
    }

    fn schema(&self, section: SectionId) -> SessionResult<&SectionSchema> {
        self.registry
            .get(section)
            .ok_or(SessionError::UnknownSection(section))
    }

    fn question<'a>(
        schema: &'a SectionSchema,
        question: &QuestionId,
    ) -> SessionResult<&'a QuestionSchema> {
        schema
            .question(question.as_str())
            .ok_or_else(|| SessionError::UnknownQuestion {
                section: schema.section_id,
                question: question.clone(),
            })
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.is_closed() {
            return Err(SessionError::Stale(self.key.to_string()));
        }
        Ok(())
    }

    /// Session was closed or submitted
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Operation currently in flight
    #[must_use]
    pub fn is_busy(&self, op: BusyOperation) -> bool {
        self.busy.flag(op).load(Ordering::Acquire)
    }

    /// Stop scheduled work; later edits are rejected
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.validation.cancel();
        self.autosave.cancel();
        tracing::debug!(key = %self.key, "session closed");
    }

    // ---- state access ----

    /// Current answers of a section
    #[must_use]
    pub fn answers(&self, section: SectionId) -> Option<AnswerSet> {
        self.state
            .read()
            .sections
            .get(&section)
            .map(|r| r.answers.clone())
    }

    /// Current visibility of a section
    #[must_use]
    pub fn visibility(&self, section: SectionId) -> Option<VisibilityMap> {
        self.state
            .read()
            .sections
            .get(&section)
            .map(|r| r.visibility.clone())
    }

    /// The user edited the section in this or a restored session
    #[must_use]
    pub fn is_initialized(&self, section: SectionId) -> bool {
        self.state
            .read()
            .sections
            .get(&section)
            .is_some_and(|r| r.initialized)
    }

    /// Files attached to a section
    #[must_use]
    pub fn files(&self, section: SectionId) -> Vec<UploadedFileRef> {
        self.state
            .read()
            .files
            .iter()
            .filter(|f| f.section_id == section)
            .cloned()
            .collect()
    }

    /// Bytes uploaded in this session
    #[must_use]
    pub fn uploaded_bytes(&self) -> u64 {
        self.state.read().uploaded_bytes
    }

    /// Section currently shown
    #[must_use]
    pub fn active_section(&self) -> SectionId {
        self.state.read().active
    }

    /// Fields marked invalid on the active section
    #[must_use]
    pub fn invalid_fields(&self) -> Vec<QuestionId> {
        self.state.read().invalid_fields.clone()
    }

    /// Result of the most recent validation pass
    #[must_use]
    pub fn last_summary(&self) -> Option<ValidationSummary> {
        self.state.read().summary.clone()
    }

    /// Reconciled draft of the current state
    #[must_use]
    pub fn document(&self) -> DraftDocument {
        self.document_from(&self.state.read())
    }

    fn document_from(&self, state: &SessionState) -> DraftDocument {
        let mut doc = DraftDocument::new(&self.key);
        for schema in self.registry.iter() {
            let Some(runtime) = state.sections.get(&schema.section_id) else {
                continue;
            };
            let files = state
                .files
                .iter()
                .filter(|f| f.section_id == schema.section_id)
                .map(UploadedFileRef::to_record)
                .collect();
            let section = DraftSection::from_answers(schema, &runtime.answers, files);
            if !section.questions.is_empty() || !section.files.is_empty() {
                doc.sections.push(section);
            }
        }
        doc
    }

    fn form_state_from(state: &SessionState) -> FormState {
        let mut form_state = FormState::default();
        for (id, runtime) in state.sections.iter().filter(|(_, r)| r.initialized) {
            form_state.record_section(*id, &runtime.answers);
        }
        form_state
    }

    fn payload(&self, status: QuestionnaireStatus) -> QuestionnairePayload {
        let mut payload = QuestionnairePayload::new(&self.key, status);
        payload.sections = self
            .document()
            .sections
            .into_iter()
            .filter(|s| !s.questions.is_empty())
            .map(|s| PayloadSection {
                section_name: s.section_name,
                questions: s.questions,
            })
            .collect();
        payload
    }

    // ---- editing ----

    /// Set one answer and recompute the section's visibility
    ///
    /// # Errors
    /// Unknown sections and questions are rejected; closed sessions return
    /// `SessionError::Stale`.
    pub fn set_answer(
        self: &Arc<Self>,
        section: SectionId,
        question: impl Into<QuestionId>,
        value: impl Into<AnswerValue>,
    ) -> SessionResult<()> {
        self.ensure_open()?;
        let schema = self.schema(section)?;
        let question = question.into();
        Self::question(schema, &question)?;
        let value = value.into();

        {
            let mut state = self.state.write();
            if let Some(runtime) = state.sections.get_mut(&section) {
                runtime.edit(schema, |answers| answers.set(question.clone(), value));
            }
            if state.active == section {
                state.invalid_fields.retain(|id| id != &question);
            }
        }
        tracing::debug!(%section, question = %question, "answer changed");
        self.schedule_follow_ups();
        Ok(())
    }

    /// Toggle a validation mechanism; returns the new selection
    ///
    /// # Errors
    /// Rejects sections without a mechanisms question.
    pub fn toggle_mechanism(
        self: &Arc<Self>,
        section: SectionId,
        mechanism: &str,
    ) -> SessionResult<Vec<String>> {
        self.ensure_open()?;
        let schema = self.schema(section)?;
        Self::question(schema, &QuestionId::from(MECHANISMS_QUESTION_ID))?;

        let selected = {
            let mut state = self.state.write();
            let mut selected = Vec::new();
            if let Some(runtime) = state.sections.get_mut(&section) {
                runtime.edit(schema, |answers| {
                    let mut mechanisms = answers.mechanisms();
                    if let Some(pos) = mechanisms.iter().position(|m| m == mechanism) {
                        mechanisms.remove(pos);
                    } else {
                        mechanisms.push(mechanism.to_string());
                    }
                    answers.set(MECHANISMS_QUESTION_ID, AnswerValue::List(mechanisms.clone()));
                    selected = mechanisms;
                });
            }
            if state.active == section && !selected.is_empty() {
                state
                    .invalid_fields
                    .retain(|id| id.as_str() != MECHANISMS_QUESTION_ID);
            }
            selected
        };
        self.schedule_follow_ups();
        Ok(selected)
    }

    /// Replace a section's answers with schema defaults and drop its files
    ///
    /// # Errors
    /// Rejects unknown sections and closed sessions.
    pub fn reset_section(self: &Arc<Self>, section: SectionId) -> SessionResult<()> {
        self.ensure_open()?;
        let schema = self.schema(section)?;
        let defaults = DraftReconciler::new().hydrate(schema, &DraftSources::default());

        {
            let mut state = self.state.write();
            if let Some(runtime) = state.sections.get_mut(&section) {
                runtime.replace(schema, defaults);
            }
            let dropped: u64 = state
                .files
                .iter()
                .filter(|f| f.section_id == section)
                .filter_map(|f| f.size_bytes)
                .sum();
            state.files.retain(|f| f.section_id != section);
            state.uploaded_bytes = state.uploaded_bytes.saturating_sub(dropped);
            if state.active == section {
                state.invalid_fields.clear();
            }
        }
        tracing::info!(%section, "section reset to defaults");
        self.schedule_follow_ups();
        Ok(())
    }

    // ---- validation ----

    /// Validate one section against the live, persisted and remote tiers
    ///
    /// # Errors
    /// Returns `SessionError::UnknownSection` for ids outside the registry.
    pub fn validate_section(&self, section: SectionId) -> SessionResult<ValidationResult> {
        let schema = self.schema(section)?;
        let state = self.state.read();
        let Some(runtime) = state.sections.get(&section) else {
            return Err(SessionError::UnknownSection(section));
        };
        Ok(self.validator.validate_with_visibility(
            section,
            schema,
            &runtime.visibility,
            &state.sources(section),
        ))
    }

    /// Validate every section and remember the summary
    pub fn validate_all_sections(&self) -> ValidationSummary {
        let state = self.state.read();
        let summary = self
            .aggregator
            .validate_all_with(&self.registry, |schema| state.sources(schema.section_id));
        drop(state);
        self.state.write().summary = Some(summary.clone());
        summary
    }

    /// Debounced pass: refresh the summary and clear fields that became valid
    fn refresh_validation(&self) {
        let summary = self.validate_all_sections();
        let mut state = self.state.write();
        let active = state.active;
        let still_invalid = summary.invalid_fields(active);
        state.invalid_fields.retain(|id| still_invalid.contains(id));
    }

    fn schedule_follow_ups(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.validation.schedule(async move {
            if let Some(session) = live_session(&weak) {
                session.refresh_validation();
            }
        });

        let weak = Arc::downgrade(self);
        self.autosave.schedule(async move {
            if let Some(session) = live_session(&weak) {
                if let Err(e) = session.persist_local().await {
                    tracing::warn!(key = %session.key, error = %e, "autosave failed");
                }
            }
        });
    }

    // ---- persistence ----

    /// Write the reconciled draft and raw form state to the draft store
    ///
    /// # Errors
    /// Propagates draft store failures.
    pub async fn persist_local(&self) -> SessionResult<()> {
        let (document, form_state) = {
            let state = self.state.read();
            (self.document_from(&state), Self::form_state_from(&state))
        };
        self.drafts.save_document(&document).await?;
        self.drafts.save_form_state(&self.key, &form_state).await?;

        let tier = PersistedTier::from_document(&self.registry, &document);
        self.state.write().persisted = tier;
        tracing::debug!(key = %self.key, sections = document.sections.len(), "draft persisted");
        Ok(())
    }

    /// Persist now instead of waiting for the autosave window
    ///
    /// # Errors
    /// Propagates draft store failures.
    pub async fn flush(&self) -> SessionResult<()> {
        self.autosave.cancel();
        self.persist_local().await
    }

    /// Save every answered section as `In Progress`
    ///
    /// # Errors
    /// Returns `SessionError::Busy` while another save runs, and the backend
    /// error after notifying the user.
    pub async fn save_draft(&self) -> SessionResult<()> {
        self.ensure_open()?;
        let _guard = self.busy.acquire(BusyOperation::Saving)?;

        if let Err(e) = self.flush().await {
            tracing::warn!(key = %self.key, error = %e, "local draft not written before save");
        }

        let payload = self.payload(QuestionnaireStatus::InProgress);
        let title = self
            .registry
            .get(self.active_section())
            .map(|s| s.section_title.clone())
            .unwrap_or_default();

        match self.remote.api().save_questionnaire(&payload).await {
            Ok(()) => {
                self.remote.invalidate(&self.key).await;
                tracing::info!(key = %self.key, sections = payload.sections.len(), "draft saved");
                self.notifier.notify(Notification::success(format!(
                    "Form data for {title} saved successfully!"
                )));
                Ok(())
            }
            Err(e) => {
                tracing::error!(key = %self.key, error = %e, "draft save failed");
                self.notifier
                    .notify(Notification::error(format!("Error saving data: {e}")));
                Err(e.into())
            }
        }
    }

    /// Send the final submission and remove local drafts
    ///
    /// Callers validate first; see [`WizardNavigator::submit`]. On failure
    /// local drafts are left untouched.
    ///
    /// # Errors
    /// Returns `SessionError::Busy` while another submission runs, and the
    /// backend error after notifying the user.
    pub async fn finalize_submission(&self) -> SessionResult<()> {
        self.ensure_open()?;
        let _guard = self.busy.acquire(BusyOperation::Submitting)?;

        let mut payload = self.payload(QuestionnaireStatus::Submitted);
        payload.latest = Some(true);

        if let Err(e) = self.remote.api().save_questionnaire(&payload).await {
            tracing::error!(key = %self.key, error = %e, "submission failed");
            self.notifier.notify(Notification::error(format!(
                "Error submitting questionnaire: {e}"
            )));
            return Err(e.into());
        }

        self.close();
        self.remote.invalidate(&self.key).await;
        match self.drafts.clear_network_function(&self.key).await {
            Ok(removed) => tracing::info!(key = %self.key, removed, "questionnaire submitted"),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "submitted but local drafts remain");
            }
        }
        self.notifier
            .notify(Notification::success("Questionnaire submitted successfully!"));
        Ok(())
    }

    // ---- files ----

    fn check_constraints(
        &self,
        state: &SessionState,
        section: SectionId,
        question: &QuestionSchema,
        files: &[PendingUpload],
    ) -> Result<(), FileConstraintViolation> {
        let existing = state
            .files
            .iter()
            .filter(|f| f.belongs_to(question.id.as_str(), section))
            .count();
        if let Some(max) = question.max_files {
            if existing + files.len() > max as usize {
                return Err(FileConstraintViolation::TooManyFiles {
                    question: question.id.clone(),
                    max,
                    existing,
                    adding: files.len(),
                });
            }
        }

        let limits = self.config.limits;
        let oversized: Vec<String> = files
            .iter()
            .filter(|f| f.size() > limits.max_single_file_bytes)
            .map(|f| f.filename.clone())
            .collect();
        if !oversized.is_empty() {
            return Err(FileConstraintViolation::FileTooLarge {
                filenames: oversized,
                limit: limits.max_single_file_bytes,
            });
        }

        let adding: u64 = files.iter().map(PendingUpload::size).sum();
        if state.uploaded_bytes + adding > limits.max_total_upload_bytes {
            return Err(FileConstraintViolation::TotalTooLarge {
                current: state.uploaded_bytes,
                adding,
                limit: limits.max_total_upload_bytes,
            });
        }
        Ok(())
    }

    /// Upload files to a file question, one after another
    ///
    /// Limits are checked before any network call. The whole batch is bounded
    /// by the configured upload timeout; files finished before it fired stay
    /// attached.
    ///
    /// # Errors
    /// - `SessionError::FileConstraint` when a limit is exceeded
    /// - `SessionError::Busy` while another batch runs
    /// - `SessionError::UploadTimeout` when the batch takes too long
    pub async fn upload_files(
        self: &Arc<Self>,
        section: SectionId,
        question: impl Into<QuestionId>,
        files: Vec<PendingUpload>,
    ) -> SessionResult<UploadReport> {
        self.ensure_open()?;
        let schema = self.schema(section)?;
        let question = question.into();
        let question_schema = Self::question(schema, &question)?;
        if question_schema.kind != QuestionType::File {
            return Err(SessionError::NotAFileQuestion(question));
        }
        if files.is_empty() {
            return Ok(UploadReport::default());
        }

        let checked = {
            let state = self.state.read();
            self.check_constraints(&state, section, question_schema, &files)
        };
        if let Err(violation) = checked {
            tracing::warn!(%section, question = %question, error = %violation, "upload rejected");
            self.notifier.notify(Notification::error(violation.to_string()));
            return Err(violation.into());
        }

        let _guard = self.busy.acquire(BusyOperation::Uploading)?;
        self.notifier.notify(Notification::info(format!(
            "Uploading {} file(s)...",
            files.len()
        )));

        let mut report = UploadReport::default();
        let batch = self.upload_sequentially(schema, &question, files, &mut report);
        let timed_out = tokio::time::timeout(self.config.upload_timeout(), batch)
            .await
            .is_err();

        if !report.uploaded.is_empty() {
            self.files_changed(section, &question);
        }
        if timed_out {
            tracing::error!(
                %section,
                question = %question,
                uploaded = report.uploaded.len(),
                "upload batch timed out"
            );
            self.notifier.notify(Notification::error(
                "Upload is taking longer than expected. Please check your connection and try again.",
            ));
            return Err(SessionError::UploadTimeout(self.config.upload_timeout_secs));
        }

        tracing::info!(
            %section,
            question = %question,
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "upload batch finished"
        );
        if let Some(notification) = report.notification() {
            self.notifier.notify(notification);
        }
        Ok(report)
    }

    async fn upload_sequentially(
        &self,
        schema: &SectionSchema,
        question: &QuestionId,
        files: Vec<PendingUpload>,
        report: &mut UploadReport,
    ) {
        let api = self.remote.api();
        for file in files {
            let size = file.size();
            let checksum = hex::encode(Sha256::digest(&file.content));
            let request = UploadRequest {
                key: self.key.clone(),
                section_name: schema.section_name.clone(),
                question_id: question.clone(),
                filename: file.filename.clone(),
                content: file.content,
            };

            match api.upload_file(request).await {
                Ok(receipt) => {
                    let name = receipt
                        .files
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| file.filename.clone());
                    let remote_url = api
                        .download_url(&self.key, &schema.section_name, &name)
                        .ok();
                    let upload = UploadedFileRef {
                        id: uuid::Uuid::new_v4().to_string(),
                        name,
                        size_bytes: Some(size),
                        checksum: Some(checksum),
                        question_id: question.clone(),
                        section_id: schema.section_id,
                        remote_url,
                        uploaded_at: Some(chrono::Utc::now()),
                    };
                    {
                        let mut state = self.state.write();
                        state.files.retain(|f| {
                            !(f.belongs_to(question.as_str(), schema.section_id)
                                && f.name == upload.name)
                        });
                        state.files.push(upload.clone());
                        state.uploaded_bytes += size;
                    }
                    report.uploaded.push(upload);
                }
                Err(error) => {
                    tracing::warn!(file = %file.filename, error = %error, "file upload failed");
                    report.failed.push(FailedUpload {
                        filename: file.filename,
                        error,
                    });
                }
            }
        }
    }

    fn files_changed(self: &Arc<Self>, section: SectionId, question: &QuestionId) {
        {
            let mut state = self.state.write();
            if state.active == section {
                state.invalid_fields.retain(|id| id != question);
            }
            if let Some(runtime) = state.sections.get_mut(&section) {
                runtime.initialized = true;
            }
        }
        self.schedule_follow_ups();
    }

    fn find_file(&self, section: SectionId, file_id: &str) -> SessionResult<UploadedFileRef> {
        self.state
            .read()
            .files
            .iter()
            .find(|f| f.section_id == section && f.id == file_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownFile(file_id.to_string()))
    }

    /// Delete an attached file from the backend and every local tier
    ///
    /// # Errors
    /// Returns `SessionError::UnknownFile` or the backend error after
    /// notifying the user.
    pub async fn remove_file(self: &Arc<Self>, section: SectionId, file_id: &str) -> SessionResult<()> {
        self.ensure_open()?;
        let schema = self.schema(section)?;
        let file = self.find_file(section, file_id)?;

        if let Err(e) = self
            .remote
            .api()
            .delete_file(&self.key, &schema.section_name, &file.name)
            .await
        {
            tracing::error!(%section, file = %file.name, error = %e, "file delete failed");
            self.notifier
                .notify(Notification::error(format!("Error deleting file: {e}")));
            return Err(e.into());
        }

        {
            let mut state = self.state.write();
            state.files.retain(|f| f.id != file.id);
            state.forget_file(section, &file.name);
            state.uploaded_bytes = state
                .uploaded_bytes
                .saturating_sub(file.size_bytes.unwrap_or(0));
        }
        self.remote.invalidate(&self.key).await;
        tracing::info!(%section, file = %file.name, "file deleted");
        self.notifier.notify(Notification::success(format!(
            "File {} deleted successfully",
            file.name
        )));
        self.schedule_follow_ups();
        Ok(())
    }

    /// Download location of an attached file
    ///
    /// # Errors
    /// Returns `SessionError::UnknownFile` or a URL building error.
    pub fn download_url(&self, section: SectionId, file_id: &str) -> SessionResult<String> {
        let schema = self.schema(section)?;
        let file = self.find_file(section, file_id)?;
        if let Some(url) = file.remote_url {
            return Ok(url);
        }
        Ok(self
            .remote
            .api()
            .download_url(&self.key, &schema.section_name, &file.name)?)
    }
}

fn live_session(weak: &Weak<QuestionnaireSession>) -> Option<Arc<QuestionnaireSession>> {
    weak.upgrade().filter(|session| !session.is_closed())
}

#[async_trait]
impl SectionController for QuestionnaireSession {
    async fn save(&self) -> SessionResult<()> {
        self.save_draft().await
    }

    async fn validate_all(&self) -> ValidationSummary {
        self.validate_all_sections()
    }

    fn set_invalid_fields(&self, ids: Vec<QuestionId>) {
        self.state.write().invalid_fields = ids;
    }

    fn active_section(&self) -> SectionId {
        self.state.read().active
    }

    fn activate(&self, section: SectionId) {
        let mut state = self.state.write();
        if state.active != section {
            state.active = section;
            state.invalid_fields.clear();
        }
    }

    async fn finalize(&self) -> SessionResult<()> {
        self.finalize_submission().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockQuestionnaireApi, UploadReceipt};
    use crate::notify::{NotificationLevel, NotificationLog};
    use pretty_assertions::assert_eq;

    fn registry() -> Arc<SchemaRegistry> {
        let section = SectionSchema::new(
            SectionId(0),
            "healthcheck",
            vec![
                QuestionSchema::new("performed", QuestionType::Radio)
                    .required()
                    .with_options(["yes", "no"])
                    .with_branch("yes", ["evidence"])
                    .with_branch("no", ["reason"]),
                QuestionSchema::new("evidence", QuestionType::File)
                    .required()
                    .hidden()
                    .with_max_files(2),
                QuestionSchema::new("reason", QuestionType::Textarea)
                    .required()
                    .hidden(),
            ],
        );
        Arc::new(SchemaRegistry::from_sections([section]).unwrap())
    }

    fn offline_api() -> MockQuestionnaireApi {
        let mut api = MockQuestionnaireApi::new();
        api.expect_fetch_questionnaire()
            .returning(|key| Ok(DraftDocument::new(key)));
        api.expect_download_url()
            .returning(|_, section, file| Ok(format!("http://files/{section}/{file}")));
        api
    }

    async fn open(
        api: MockQuestionnaireApi,
        config: SessionConfig,
    ) -> (Arc<QuestionnaireSession>, Arc<NotificationLog>) {
        let log = Arc::new(NotificationLog::new());
        let session = QuestionnaireSession::builder(DraftKey::new("nf", "v1"), Arc::new(api))
            .with_registry(registry())
            .with_notifier(log.clone())
            .with_config(config)
            .open()
            .await
            .unwrap();
        (session, log)
    }

    #[tokio::test]
    async fn answer_change_recomputes_visibility() {
        let (session, _) = open(offline_api(), SessionConfig::default()).await;
        let s0 = SectionId(0);

        let visibility = session.visibility(s0).unwrap();
        assert!(!visibility.is_visible("evidence"));
        assert!(!session.is_initialized(s0));

        session.set_answer(s0, "performed", "no").unwrap();
        let visibility = session.visibility(s0).unwrap();
        assert!(visibility.is_visible("reason"));
        assert!(!visibility.is_visible("evidence"));
        assert!(session.is_initialized(s0));

        assert_eq!(
            session.validate_section(s0).unwrap().invalid_field_ids,
            vec![QuestionId::from("reason")]
        );
        assert!(matches!(
            session.set_answer(s0, "ghost", "x"),
            Err(SessionError::UnknownQuestion { .. })
        ));
    }

    #[tokio::test]
    async fn too_many_files_rejected_before_network() {
        let mut api = offline_api();
        api.expect_upload_file().never();
        let (session, log) = open(api, SessionConfig::default()).await;

        let files = (0..3)
            .map(|i| PendingUpload::new(format!("e{i}.pdf"), vec![0u8; 4]))
            .collect();
        let err = session
            .upload_files(SectionId(0), "evidence", files)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::FileConstraint(FileConstraintViolation::TooManyFiles { max: 2, .. })
        ));
        assert_eq!(log.last().unwrap().level, NotificationLevel::Error);
    }

    #[tokio::test]
    async fn oversized_and_total_limits() {
        let mut api = offline_api();
        api.expect_upload_file().never();
        let config = SessionConfig::default().with_limits(crate::config::UploadLimits {
            max_single_file_bytes: 10,
            max_total_upload_bytes: 15,
        });
        let (session, _) = open(api, config).await;

        let err = session
            .upload_files(
                SectionId(0),
                "evidence",
                vec![PendingUpload::new("big.iso", vec![0u8; 11])],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::FileConstraint(FileConstraintViolation::FileTooLarge { .. })
        ));

        let err = session
            .upload_files(
                SectionId(0),
                "evidence",
                vec![
                    PendingUpload::new("a.pdf", vec![0u8; 8]),
                    PendingUpload::new("b.pdf", vec![0u8; 8]),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::FileConstraint(FileConstraintViolation::TotalTooLarge { adding: 16, .. })
        ));
    }

    #[tokio::test]
    async fn partial_upload_failure_warns() {
        let mut api = offline_api();
        api.expect_upload_file().returning(|request| {
            if request.filename == "bad.pdf" {
                Err(ApiError::Status {
                    status: 500,
                    message: "Failed to upload file to Artifactory".into(),
                })
            } else {
                Ok(UploadReceipt {
                    message: "ok".into(),
                    files: vec![request.filename],
                })
            }
        });
        let (session, log) = open(api, SessionConfig::default()).await;
        session.set_answer(SectionId(0), "performed", "yes").unwrap();

        let report = session
            .upload_files(
                SectionId(0),
                "evidence",
                vec![
                    PendingUpload::new("good.pdf", b"evidence".to_vec()),
                    PendingUpload::new("bad.pdf", b"oops".to_vec()),
                ],
            )
            .await
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.uploaded.len(), 1);
        let uploaded = &report.uploaded[0];
        assert_eq!(uploaded.size_bytes, Some(8));
        assert_eq!(
            uploaded.checksum.as_deref(),
            Some(hex::encode(Sha256::digest(b"evidence")).as_str())
        );
        assert_eq!(
            uploaded.remote_url.as_deref(),
            Some("http://files/healthcheck/good.pdf")
        );
        assert_eq!(session.uploaded_bytes(), 8);

        let toast = log.last().unwrap();
        assert_eq!(toast.level, NotificationLevel::Warning);
        assert_eq!(toast.text, "1 files uploaded successfully. 1 files failed.");
        assert_eq!(toast.details.as_deref(), Some("Failed files: bad.pdf"));

        assert!(session.validate_section(SectionId(0)).unwrap().is_valid);
    }

    #[tokio::test]
    async fn non_file_question_rejects_uploads() {
        let (session, _) = open(offline_api(), SessionConfig::default()).await;
        let err = session
            .upload_files(SectionId(0), "reason", vec![PendingUpload::new("a", vec![1])])
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotAFileQuestion(_)));
    }

    #[tokio::test]
    async fn failed_save_keeps_local_draft_and_notifies() {
        let mut api = offline_api();
        api.expect_save_questionnaire()
            .times(1)
            .returning(|_| Err(ApiError::Transport("connection refused".into())));
        let (session, log) = open(api, SessionConfig::default()).await;
        session.set_answer(SectionId(0), "performed", "yes").unwrap();

        assert!(session.save_draft().await.is_err());
        assert!(!session.is_busy(BusyOperation::Saving));
        let toast = log.last().unwrap();
        assert_eq!(toast.text, "Error saving data: request failed: connection refused");

        let stored = session.drafts.load_document(session.key()).await.unwrap();
        assert_eq!(
            stored.answers_for("healthcheck").get("performed"),
            Some(&AnswerValue::text("yes"))
        );
    }

    #[tokio::test]
    async fn closed_session_rejects_edits() {
        let (session, _) = open(offline_api(), SessionConfig::default()).await;
        session.close();
        assert!(matches!(
            session.set_answer(SectionId(0), "performed", "yes"),
            Err(SessionError::Stale(_))
        ));
    }
}
