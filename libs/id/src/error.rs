//! Error types for ID parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating IDs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The ID string is empty.
    #[error("ID cannot be empty")]
    Empty,

    /// The ID exceeds the maximum length.
    #[error("ID too long: at most {max} bytes, got {actual}")]
    TooLong { max: usize, actual: usize },

    /// The ID starts or ends with whitespace.
    #[error("ID must not start or end with whitespace")]
    SurroundingWhitespace,

    /// The ID contains a control character.
    #[error("ID contains invalid character {0:?}")]
    InvalidCharacter(char),
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }
}
