//! Testing utilities for NAAVI workspace
//!
//! Shared fixtures and an in-process questionnaire backend.

#![allow(missing_docs)]

use async_trait::async_trait;
use naavi_draft::{DraftDocument, DraftQuestion, DraftSection};
use naavi_model::{
    AnswerValue, DraftKey, FileRecord, QuestionId, QuestionSchema, QuestionType, SchemaRegistry,
    SectionId, SectionSchema, UploadedFileRef,
};
use naavi_session::{
    ApiError, ApiResult, NetworkFunctionInfo, QuestionnaireApi, QuestionnairePayload,
    QuestionnaireStatus, UploadReceipt, UploadRequest, VersionEntry, VersionInfo,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

pub const NETWORK_FUNCTION: &str = "Nokia - 5G CHF ME";
pub const VERSION_NAME: &str = "v1.0.0";
pub const SINGLE_QUESTION_ID: &str = "answer";

const SECTION_NAMES: [&str; 13] = [
    "healthcheck",
    "preinstall",
    "install",
    "postinstall",
    "preupgrade",
    "upgrade",
    "postupgrade",
    "configaudit",
    "configchange",
    "rollback",
    "assurance",
    "georedundant",
    "disasterrecovery",
];

pub fn scenario_key() -> DraftKey {
    DraftKey::new(NETWORK_FUNCTION, VERSION_NAME)
}

/// Section 0 with one required yes/no radio
pub fn health_check_section() -> SectionSchema {
    let mut section = SectionSchema::new(
        SectionId(0),
        "healthcheck",
        vec![QuestionSchema::new("healthCheckPerformed", QuestionType::Radio)
            .with_text("Has a health check been performed?")
            .required()
            .with_options(["yes", "no"])],
    );
    section.section_title = "Health Check".to_string();
    section
}

pub fn health_check_registry() -> SchemaRegistry {
    SchemaRegistry::from_sections([health_check_section()]).unwrap()
}

/// 13 sections, each with a single required text question
pub fn single_question_registry() -> SchemaRegistry {
    let sections = SECTION_NAMES.iter().zip(0u32..).map(|(name, id)| {
        SectionSchema::new(
            SectionId(id),
            *name,
            vec![QuestionSchema::new(SINGLE_QUESTION_ID, QuestionType::Text).required()],
        )
    });
    SchemaRegistry::from_sections(sections).unwrap()
}

/// Live upload attached to `question_id` of `section_id`
pub fn uploaded_file(name: &str, question_id: &str, section_id: SectionId) -> UploadedFileRef {
    UploadedFileRef {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        size_bytes: Some(1024),
        checksum: None,
        question_id: QuestionId::from(question_id),
        section_id,
        remote_url: None,
        uploaded_at: Some(chrono::Utc::now()),
    }
}

/// Saved section as the backend returns it
pub fn remote_section(name: &str, answers: &[(&str, &str)], files: &[&str]) -> DraftSection {
    let mut section = DraftSection::new(name);
    section.questions = answers
        .iter()
        .map(|(id, answer)| DraftQuestion {
            question_id: QuestionId::from(*id),
            question_text: String::new(),
            answer: AnswerValue::text(*answer),
        })
        .collect();
    section.files = files
        .iter()
        .map(|f| FileRecord {
            filename: (*f).to_string(),
            checksum: None,
            question_id: None,
        })
        .collect();
    section
}

/// Call made against [`FakeQuestionnaireApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    NetworkFunctions,
    Fetch(DraftKey),
    FetchSection(DraftKey, String),
    Save(DraftKey, QuestionnaireStatus),
    Upload(String, String),
    Delete(String, String),
    AddVersion(DraftKey),
    SetLatest(DraftKey),
}

/// In-process backend with scripted failures
#[derive(Debug, Default)]
pub struct FakeQuestionnaireApi {
    documents: Mutex<BTreeMap<(String, String), DraftDocument>>,
    versions: Mutex<BTreeMap<(String, String), VersionInfo>>,
    calls: Mutex<Vec<ApiCall>>,
    saved: Mutex<Vec<QuestionnairePayload>>,
    failing_uploads: Mutex<HashSet<String>>,
    upload_delay: Mutex<Option<Duration>>,
    fail_fetch: Mutex<Option<ApiError>>,
    fail_save: Mutex<Option<ApiError>>,
    fail_delete: Mutex<Option<ApiError>>,
}

fn slot(key: &DraftKey) -> (String, String) {
    (key.network_function.clone(), key.version.clone())
}

fn server_error(message: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        message: message.to_string(),
    }
}

impl FakeQuestionnaireApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend already holding `document`
    pub fn with_document(document: DraftDocument) -> Self {
        let api = Self::new();
        api.put_document(document);
        api
    }

    pub fn put_document(&self, document: DraftDocument) {
        let key = document.key();
        self.touch_version(&key);
        self.documents.lock().insert(slot(&key), document);
    }

    pub fn document(&self, key: &DraftKey) -> Option<DraftDocument> {
        self.documents.lock().get(&slot(key)).cloned()
    }

    pub fn version_info(&self, key: &DraftKey) -> Option<VersionInfo> {
        self.versions.lock().get(&slot(key)).cloned()
    }

    fn touch_version(&self, key: &DraftKey) {
        self.versions
            .lock()
            .entry(slot(key))
            .or_insert_with(|| VersionInfo {
                name: key.version.clone(),
                status: None,
                latest: false,
            });
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    pub fn saved_payloads(&self) -> Vec<QuestionnairePayload> {
        self.saved.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ApiCall::Fetch(_)))
            .count()
    }

    pub fn fail_upload_of(&self, filename: &str) {
        self.failing_uploads.lock().insert(filename.to_string());
    }

    pub fn delay_uploads(&self, delay: Duration) {
        *self.upload_delay.lock() = Some(delay);
    }

    pub fn fail_fetch(&self, message: &str) {
        *self.fail_fetch.lock() = Some(server_error(message));
    }

    pub fn fail_save(&self, message: &str) {
        *self.fail_save.lock() = Some(server_error(message));
    }

    pub fn fail_delete(&self, message: &str) {
        *self.fail_delete.lock() = Some(server_error(message));
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl QuestionnaireApi for FakeQuestionnaireApi {
    async fn network_functions(&self) -> ApiResult<Vec<NetworkFunctionInfo>> {
        self.record(ApiCall::NetworkFunctions);
        let mut by_nf: BTreeMap<String, Vec<VersionEntry>> = BTreeMap::new();
        for ((nf, _), info) in self.versions.lock().iter() {
            by_nf
                .entry(nf.clone())
                .or_default()
                .push(VersionEntry::Detail(info.clone()));
        }
        Ok(by_nf
            .into_iter()
            .map(|(nf_name, versions)| NetworkFunctionInfo { nf_name, versions })
            .collect())
    }

    async fn fetch_questionnaire(&self, key: &DraftKey) -> ApiResult<DraftDocument> {
        self.record(ApiCall::Fetch(key.clone()));
        if let Some(e) = self.fail_fetch.lock().clone() {
            return Err(e);
        }
        Ok(self.document(key).unwrap_or_else(|| DraftDocument::new(key)))
    }

    async fn fetch_section(&self, key: &DraftKey, section: &str) -> ApiResult<DraftDocument> {
        self.record(ApiCall::FetchSection(key.clone(), section.to_string()));
        let mut doc = self.document(key).unwrap_or_else(|| DraftDocument::new(key));
        doc.sections.retain(|s| s.section_name.eq_ignore_ascii_case(section));
        Ok(doc)
    }

    async fn save_questionnaire(&self, payload: &QuestionnairePayload) -> ApiResult<()> {
        let key = DraftKey::new(payload.nf_name.clone(), payload.version.clone());
        self.record(ApiCall::Save(key.clone(), payload.status));
        if let Some(e) = self.fail_save.lock().clone() {
            return Err(e);
        }
        if payload.sections.is_empty() {
            return Err(ApiError::Status {
                status: 400,
                message: "No questions provided".to_string(),
            });
        }
        self.saved.lock().push(payload.clone());

        {
            let mut documents = self.documents.lock();
            let doc = documents
                .entry(slot(&key))
                .or_insert_with(|| DraftDocument::new(&key));
            for section in &payload.sections {
                let stored = doc.section_or_insert(&section.section_name);
                stored.questions = section.questions.clone();
            }
        }
        self.touch_version(&key);
        if let Some(info) = self.versions.lock().get_mut(&slot(&key)) {
            info.status = Some(payload.status.as_str().to_string());
            if let Some(latest) = payload.latest {
                info.latest = latest;
            }
        }
        Ok(())
    }

    async fn upload_file(&self, request: UploadRequest) -> ApiResult<UploadReceipt> {
        self.record(ApiCall::Upload(
            request.section_name.clone(),
            request.filename.clone(),
        ));
        let delay = *self.upload_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_uploads.lock().contains(&request.filename) {
            return Err(server_error("Failed to upload file to Artifactory"));
        }

        let mut documents = self.documents.lock();
        let key = &request.key;
        let doc = documents
            .entry(slot(key))
            .or_insert_with(|| DraftDocument::new(key));
        doc.section_or_insert(&request.section_name)
            .upsert_file(FileRecord {
                filename: request.filename.clone(),
                checksum: None,
                question_id: Some(request.question_id.clone()),
            });
        Ok(UploadReceipt {
            message: "File uploaded successfully".to_string(),
            files: vec![request.filename],
        })
    }

    async fn delete_file(&self, key: &DraftKey, section: &str, filename: &str) -> ApiResult<()> {
        self.record(ApiCall::Delete(section.to_string(), filename.to_string()));
        if let Some(e) = self.fail_delete.lock().clone() {
            return Err(e);
        }
        let mut documents = self.documents.lock();
        if let Some(doc) = documents.get_mut(&slot(key)) {
            if let Some(s) = doc.section_mut(section) {
                s.remove_file(filename);
            }
        }
        Ok(())
    }

    fn download_url(&self, key: &DraftKey, section: &str, filename: &str) -> ApiResult<String> {
        Ok(format!(
            "fake://{}/{}/{section}/{filename}",
            key.network_function, key.version
        ))
    }

    async fn add_version(&self, key: &DraftKey) -> ApiResult<()> {
        self.record(ApiCall::AddVersion(key.clone()));
        self.touch_version(key);
        Ok(())
    }

    async fn set_latest(&self, key: &DraftKey) -> ApiResult<()> {
        self.record(ApiCall::SetLatest(key.clone()));
        for ((nf, version), info) in self.versions.lock().iter_mut() {
            if nf == &key.network_function {
                info.latest = version == &key.version;
            }
        }
        Ok(())
    }
}
