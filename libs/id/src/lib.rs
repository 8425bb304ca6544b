//! # reviewers-id
//!
//! Typed identifiers for the reviewers service.
//!
//! ## Design Principles
//!
//! - Identifiers are chosen by callers (teams, users, pull requests come
//!   from an upstream VCS), so parsing validates instead of generating
//! - Each resource has its own type so a user id can never be passed where
//!   a pull request id is expected
//! - The canonical string form is exactly the input string; parsing and
//!   formatting round-trip
//!
//! ## Accepted format
//!
//! A non-empty string of at most [`MAX_ID_LEN`] bytes with no leading or
//! trailing whitespace and no control characters.
//!
//! Examples: `u1`, `backend`, `pr-1001`.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Maximum byte length of any identifier.
pub const MAX_ID_LEN: usize = 128;

/// Validates a raw identifier string.
///
/// Shared by every type generated with [`define_id!`].
pub fn validate(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }

    if s.len() > MAX_ID_LEN {
        return Err(IdError::TooLong {
            max: MAX_ID_LEN,
            actual: s.len(),
        });
    }

    if s.trim() != s {
        return Err(IdError::SurroundingWhitespace);
    }

    if let Some(c) = s.chars().find(|c| c.is_control()) {
        return Err(IdError::InvalidCharacter(c));
    }

    Ok(())
}
