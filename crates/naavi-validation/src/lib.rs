//! NAAVI Section Validation
//!
//! Conditional visibility and required-field validation over the static
//! questionnaire schema.
//!
//! # Overview
//!
//! - [`VisibilityResolver`]: which questions of a section are shown
//! - [`FieldValidator`]: which visible, required questions are unsatisfied
//! - [`CrossSectionAggregator`]: section id -> invalid fields across the wizard
//!
//! All three are pure: identical inputs always give identical results, and
//! validation failures are values, never errors.
//!
//! # Example
//!
//! ```rust
//! use naavi_model::{AnswerSet, SchemaRegistry, SectionId};
//! use naavi_validation::{AnswerSources, FieldValidator};
//!
//! let registry = SchemaRegistry::builtin().unwrap();
//! let health = registry.get(SectionId(0)).unwrap();
//!
//! let answers = AnswerSet::new();
//! let result = FieldValidator::new().validate_section(
//!     SectionId(0),
//!     health,
//!     &AnswerSources::live(&answers),
//! );
//! assert!(!result.is_valid);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod aggregate;
pub mod validator;
pub mod visibility;

// Re-exports
pub use aggregate::{validate_all, CrossSectionAggregator, ValidationSummary};
pub use validator::{validate_section, AnswerSources, FieldValidator, ValidationResult};
pub use visibility::{resolve_visibility, VisibilityMap, VisibilityResolver};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for validation
    pub use crate::{
        AnswerSources, CrossSectionAggregator, FieldValidator, ValidationResult,
        ValidationSummary, VisibilityMap, VisibilityResolver,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
