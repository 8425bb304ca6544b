//! Typed ID definitions for all service resources.

use crate::define_id;

// =============================================================================
// Membership
// =============================================================================

define_id!(UserId, "user");
define_id!(TeamName, "team");

// =============================================================================
// Review
// =============================================================================

define_id!(PullRequestId, "pull request");

// =============================================================================
// Reference data
// =============================================================================

/// Stored identifier of a pull request status row.
///
/// Status ids are database-assigned integers, not caller-supplied strings,
/// so they are handled separately from the typed IDs above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusId(i64);

impl StatusId {
    /// Creates a new StatusId from an i64.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying i64 value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for StatusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for StatusId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<StatusId> for i64 {
    fn from(id: StatusId) -> Self {
        id.0
    }
}

impl serde::Serialize for StatusId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for StatusId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i64::deserialize(deserializer)?;
        Ok(Self(id))
    }
}

// =============================================================================
// Tests
// =============================================================================
