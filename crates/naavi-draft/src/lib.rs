//! NAAVI Drafts
//!
//! Persisted questionnaire drafts and the reconciliation of answers and files
//! across the live, persisted and remote tiers.
//!
//! # Overview
//!
//! - [`DraftDocument`] / [`FormState`]: the two persisted document shapes
//! - [`DraftStore`]: last-write-wins key/value storage ([`MemoryDraftStore`],
//!   [`FileDraftStore`])
//! - [`DraftRepository`]: typed load/save; malformed drafts read as absent
//! - [`DraftReconciler`]: prioritized merge of answer and file tiers

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod document;
pub mod error;
pub mod reconcile;
pub mod store;

// Re-exports
pub use document::{DraftDocument, DraftQuestion, DraftSection, FormState};
pub use error::{DraftError, DraftResult};
pub use reconcile::{assign_file_question, hydrate, DraftReconciler, DraftSources};
pub use store::{DraftRepository, DraftStore, FileDraftStore, MemoryDraftStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
