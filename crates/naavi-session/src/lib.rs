//! NAAVI Questionnaire Session
//!
//! Orchestration around the pure validation core: one editable session per
//! (network function, version), backed by the questionnaire backend and the
//! local draft store.
//!
//! # Overview
//!
//! - [`QuestionnaireSession`]: answers, visibility, files and invalid fields;
//!   debounced validation and autosave
//! - [`WizardNavigator`]: save-before-navigate and the submit flow over a
//!   [`SectionController`]
//! - [`QuestionnaireApi`] / [`HttpQuestionnaireApi`]: backend contract
//! - [`RemoteSnapshots`]: TTL cache of prior submissions
//! - [`QuestionnaireProgress`]: completion and automation metrics
//! - [`SessionConfig`]: defaults, TOML file and `NAAVI_*` overrides
//!
//! # Example
//!
//! ```rust,no_run
//! use naavi_model::{DraftKey, SectionId};
//! use naavi_session::{HttpQuestionnaireApi, QuestionnaireSession, SessionConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::from_env()?;
//! let api = Arc::new(HttpQuestionnaireApi::from_config(&config)?);
//! let session = QuestionnaireSession::builder(DraftKey::new("Nokia - 5G CHF ME", "v1.0.0"), api)
//!     .with_config(config)
//!     .open()
//!     .await?;
//!
//! session.set_answer(SectionId(0), "healthCheckPerformed", "yes")?;
//! let outcome = session.navigator().submit().await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod notify;
pub mod progress;
pub mod remote;
pub mod scheduler;
pub mod session;
pub mod telemetry;

// Re-exports
pub use api::{
    HttpQuestionnaireApi, NetworkFunctionInfo, PayloadSection, QuestionnaireApi,
    QuestionnairePayload, QuestionnaireStatus, UploadReceipt, UploadRequest, VersionEntry,
    VersionInfo,
};
pub use config::{ConfigError, SessionConfig, UploadLimits};
pub use controller::{SectionController, SubmitOutcome, WizardNavigator};
pub use error::{
    ApiError, ApiResult, BusyOperation, FileConstraintViolation, SessionError, SessionResult,
};
pub use notify::{Notification, NotificationLevel, NotificationLog, Notifier, TracingNotifier};
pub use progress::{
    AutomationMetrics, QuestionnaireProgress, SectionProgress, SectionStatus, VersionStatusCounts,
};
pub use remote::RemoteSnapshots;
pub use scheduler::{Debouncer, PendingTask};
pub use session::{
    FailedUpload, PendingUpload, QuestionnaireSession, SessionBuilder, UploadReport,
};
pub use telemetry::{init_tracing, LogFormat};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for session orchestration
    pub use crate::{
        Notification, Notifier, PendingUpload, QuestionnaireApi, QuestionnaireSession,
        SectionController, SessionConfig, SessionError, SessionResult, SubmitOutcome,
        WizardNavigator,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
