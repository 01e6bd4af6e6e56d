//! NAAVI Questionnaire Model
//!
//! Static schema and answer types shared by every layer of the questionnaire.
//!
//! # Overview
//!
//! - [`SchemaRegistry`]: immutable per-section definitions (13 built-in steps)
//! - [`SectionSchema`] / [`QuestionSchema`]: questions, options, conditional branches
//! - [`AnswerSet`] / [`AnswerValue`]: answers of one section instance
//! - [`FileRecord`] / [`UploadedFileRef`]: attached-file bookkeeping
//! - [`DraftKey`]: the (network function, version) pair naming a questionnaire
//!
//! # Example
//!
//! ```rust
//! use naavi_model::{SchemaRegistry, SectionId};
//!
//! let registry = SchemaRegistry::builtin().unwrap();
//! let health = registry.get(SectionId(0)).unwrap();
//! assert_eq!(health.section_name, "healthcheck");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod answer;
pub mod error;
pub mod file;
pub mod ids;
pub mod registry;
pub mod schema;

// Re-exports
pub use answer::{
    AnswerSet, AnswerValue, MECHANISMS_QUESTION_ID, OTHER_MECHANISM_QUESTION_ID, OTHER_OPTION,
};
pub use error::{SchemaError, SchemaResult};
pub use file::{FileRecord, UploadedFileRef, DEFAULT_FILE_QUESTION};
pub use ids::{DraftKey, QuestionId, SectionId};
pub use registry::{SchemaRegistry, SharedTarget};
pub use schema::{QuestionOption, QuestionSchema, QuestionType, SectionSchema};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for schema and answer handling
    pub use crate::{
        AnswerSet, AnswerValue, DraftKey, FileRecord, QuestionId, QuestionSchema, QuestionType,
        SchemaRegistry, SectionId, SectionSchema, UploadedFileRef,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
