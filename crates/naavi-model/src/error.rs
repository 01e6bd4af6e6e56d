//! Schema loading and lint errors

use crate::ids::{QuestionId, SectionId};

/// Errors raised while loading or checking a schema registry
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// YAML document could not be parsed
    #[error("schema parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two sections share an id
    #[error("duplicate section id: {0}")]
    DuplicateSection(SectionId),

    /// Two sections share a storage name
    #[error("duplicate section name: '{0}'")]
    DuplicateSectionName(String),

    /// Two questions in one section share an id
    #[error("duplicate question '{question}' in section {section}")]
    DuplicateQuestion {
        section: SectionId,
        question: QuestionId,
    },

    /// A conditional branch references a question the section does not declare
    #[error("question '{source_question}' in section {section} reveals unknown question '{target}'")]
    UnknownConditionalTarget {
        section: SectionId,
        source_question: QuestionId,
        target: QuestionId,
    },

    /// A branch is keyed by a value that is not one of the question's options
    #[error("question '{question}' in section {section} has a branch for unknown option '{option}'")]
    UnknownBranchOption {
        section: SectionId,
        question: QuestionId,
        option: String,
    },

    /// A radio question without options
    #[error("radio question '{question}' in section {section} has no options")]
    RadioWithoutOptions {
        section: SectionId,
        question: QuestionId,
    },

    /// A file question without a positive file limit
    #[error("file question '{question}' in section {section} needs maxFiles >= 1")]
    MissingFileLimit {
        section: SectionId,
        question: QuestionId,
    },
}

/// Result alias for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SchemaError::UnknownConditionalTarget {
            section: SectionId(3),
            source_question: QuestionId::from("performed"),
            target: QuestionId::from("ghost"),
        };
        assert_eq!(
            err.to_string(),
            "question 'performed' in section 3 reveals unknown question 'ghost'"
        );
    }
}
