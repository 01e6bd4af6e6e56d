//! Questionnaire backend
//!
//! [`QuestionnaireApi`] is the REST collaborator of a session. The HTTP
//! implementation follows the backend's contract:
//!
//! | call | request |
//! |---|---|
//! | network functions | `GET /api/nf_info` |
//! | questionnaire | `GET /api/questionnaire?nfName&version[&section]` |
//! | save / submit | `POST /api/questionnaire` (status distinguishes them) |
//! | upload | `POST /api/upload` multipart `file, nf_name, section, version, questionId` |
//! | delete | `DELETE /api/delete_file?nf_name&version_name&section&file_name` |
//! | download | `GET /api/download_file?nf_name&version_name&section&file_name` |
//! | add version | `POST /api/add_version` |
//! | mark latest | `POST /api/set_latest?nf_name&version_name` |

use crate::config::SessionConfig;
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use naavi_draft::{DraftDocument, DraftQuestion};
use naavi_model::{DraftKey, QuestionId};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a questionnaire version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionnaireStatus {
    /// Nothing saved yet
    #[serde(rename = "Not Started")]
    NotStarted,
    /// Saved as a draft
    #[serde(rename = "In Progress")]
    InProgress,
    /// Final submission
    #[serde(rename = "Submitted")]
    Submitted,
}

impl QuestionnaireStatus {
    /// Wire label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Submitted => "Submitted",
        }
    }

    /// Parse a wire label; unknown labels yield `None`
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "Not Started" => Some(Self::NotStarted),
            "In Progress" => Some(Self::InProgress),
            "Submitted" => Some(Self::Submitted),
            _ => None,
        }
    }
}

/// One section of a save/submit request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadSection {
    /// Storage name of the section
    pub section_name: String,
    /// Answered questions
    pub questions: Vec<DraftQuestion>,
}

/// Body of `POST /api/questionnaire`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnairePayload {
    /// Network function
    pub nf_name: String,
    /// Version
    pub version: String,
    /// Sections with at least one answer
    pub sections: Vec<PayloadSection>,
    /// Draft or final submission
    pub status: QuestionnaireStatus,
    /// Mark this version as the latest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<bool>,
}

impl QuestionnairePayload {
    /// Empty payload for a key
    #[must_use]
    pub fn new(key: &DraftKey, status: QuestionnaireStatus) -> Self {
        Self {
            nf_name: key.network_function.clone(),
            version: key.version.clone(),
            sections: Vec::new(),
            status,
            latest: None,
        }
    }

    /// Section names in the payload
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.section_name.as_str())
    }
}

/// File upload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Questionnaire
    pub key: DraftKey,
    /// Storage name of the section
    pub section_name: String,
    /// Receiving question
    pub question_id: QuestionId,
    /// File name
    pub filename: String,
    /// File content
    pub content: Vec<u8>,
}

/// Backend acknowledgement of an upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Server message
    #[serde(default)]
    pub message: String,
    /// Stored file names
    #[serde(default)]
    pub files: Vec<String>,
}

/// Version entry of a network function
///
/// The backend stores either a bare version name or an object carrying the
/// version's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionEntry {
    /// Bare version name
    Name(String),
    /// Version with status
    Detail(VersionInfo),
}

/// Version with status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version name
    pub name: String,
    /// Status label
    #[serde(default)]
    pub status: Option<String>,
    /// Latest version of its network function
    #[serde(default)]
    pub latest: bool,
}

impl VersionEntry {
    /// Version name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Detail(info) => &info.name,
        }
    }

    /// Parsed status; bare names have none
    #[must_use]
    pub fn status(&self) -> Option<QuestionnaireStatus> {
        match self {
            Self::Name(_) => None,
            Self::Detail(info) => info.status.as_deref().and_then(QuestionnaireStatus::parse),
        }
    }

    /// Marked as latest
    #[must_use]
    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Detail(info) if info.latest)
    }
}

/// Network function with its versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFunctionInfo {
    /// Network function name
    pub nf_name: String,
    /// Known versions
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
}

/// REST collaborator of a questionnaire session
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionnaireApi: Send + Sync {
    /// All network functions and their versions
    async fn network_functions(&self) -> ApiResult<Vec<NetworkFunctionInfo>>;

    /// Stored questionnaire, all sections
    async fn fetch_questionnaire(&self, key: &DraftKey) -> ApiResult<DraftDocument>;

    /// Stored questionnaire, one section
    async fn fetch_section(&self, key: &DraftKey, section: &str) -> ApiResult<DraftDocument>;

    /// Save or submit answers
    async fn save_questionnaire(&self, payload: &QuestionnairePayload) -> ApiResult<()>;

    /// Upload one file
    async fn upload_file(&self, request: UploadRequest) -> ApiResult<UploadReceipt>;

    /// Delete an uploaded file
    async fn delete_file(&self, key: &DraftKey, section: &str, filename: &str) -> ApiResult<()>;

    /// Download location of an uploaded file
    fn download_url(&self, key: &DraftKey, section: &str, filename: &str) -> ApiResult<String>;

    /// Register a new version of a network function
    async fn add_version(&self, key: &DraftKey) -> ApiResult<()>;

    /// Mark a version as latest
    async fn set_latest(&self, key: &DraftKey) -> ApiResult<()>;
}

#[derive(Debug, Deserialize)]
struct ServerMessage {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddVersionBody<'a> {
    nf_name: &'a str,
    version: &'a str,
}

/// HTTP client for the questionnaire backend
#[derive(Debug, Clone)]
pub struct HttpQuestionnaireApi {
    client: Client,
    base_url: String,
}

impl HttpQuestionnaireApi {
    /// Client for `base_url`
    ///
    /// # Errors
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Client for the configured backend
    ///
    /// # Errors
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn from_config(config: &SessionConfig) -> ApiResult<Self> {
        Self::new(config.api_base_url.clone())
    }

    /// Backend base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url.trim_end_matches('/'))
    }

    fn file_params<'a>(
        key: &'a DraftKey,
        section: &'a str,
        filename: &'a str,
    ) -> [(&'static str, &'a str); 4] {
        [
            ("nf_name", key.network_function.as_str()),
            ("version_name", key.version.as_str()),
            ("section", section),
            ("file_name", filename),
        ]
    }

    /// Pass 2xx responses through, turn the rest into `ApiError::Status`
    async fn check(response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ServerMessage>(&body)
            .ok()
            .and_then(|m| m.error.or(m.message))
            .unwrap_or_else(|| body.trim().to_string());
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_questionnaire(&self, query: &[(&str, &str)]) -> ApiResult<DraftDocument> {
        let response = self
            .client
            .get(self.url("questionnaire"))
            .query(query)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait]
impl QuestionnaireApi for HttpQuestionnaireApi {
    async fn network_functions(&self) -> ApiResult<Vec<NetworkFunctionInfo>> {
        let response = self.client.get(self.url("nf_info")).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn fetch_questionnaire(&self, key: &DraftKey) -> ApiResult<DraftDocument> {
        tracing::debug!(key = %key, "fetching questionnaire");
        self.get_questionnaire(&[
            ("nfName", key.network_function.as_str()),
            ("version", key.version.as_str()),
        ])
        .await
    }

    async fn fetch_section(&self, key: &DraftKey, section: &str) -> ApiResult<DraftDocument> {
        self.get_questionnaire(&[
            ("nfName", key.network_function.as_str()),
            ("version", key.version.as_str()),
            ("section", section),
        ])
        .await
    }

    async fn save_questionnaire(&self, payload: &QuestionnairePayload) -> ApiResult<()> {
        let response = self
            .client
            .post(self.url("questionnaire"))
            .json(payload)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upload_file(&self, request: UploadRequest) -> ApiResult<UploadReceipt> {
        let part = reqwest::multipart::Part::bytes(request.content)
            .file_name(request.filename.clone());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("nf_name", request.key.network_function.clone())
            .text("section", request.section_name.clone())
            .text("version", request.key.version.clone())
            .text("questionId", request.question_id.as_str().to_string());

        let response = self
            .client
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_file(&self, key: &DraftKey, section: &str, filename: &str) -> ApiResult<()> {
        let response = self
            .client
            .delete(self.url("delete_file"))
            .query(&Self::file_params(key, section, filename))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    fn download_url(&self, key: &DraftKey, section: &str, filename: &str) -> ApiResult<String> {
        reqwest::Url::parse_with_params(
            &self.url("download_file"),
            Self::file_params(key, section, filename),
        )
        .map(String::from)
        .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    async fn add_version(&self, key: &DraftKey) -> ApiResult<()> {
        let response = self
            .client
            .post(self.url("add_version"))
            .json(&AddVersionBody {
                nf_name: &key.network_function,
                version: &key.version,
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn set_latest(&self, key: &DraftKey) -> ApiResult<()> {
        let response = self
            .client
            .post(self.url("set_latest"))
            .query(&[
                ("nf_name", key.network_function.as_str()),
                ("version_name", key.version.as_str()),
            ])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
