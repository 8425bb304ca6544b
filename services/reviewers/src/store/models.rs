//! Records read from and written to the store.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use reviewers_id::{PullRequestId, StatusId, TeamName, UserId};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }

    /// Parses a stored status name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "OPEN" => Some(Self::Open),
            "MERGED" => Some(Self::Merged),
            _ => None,
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved status row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub id: StatusId,
    pub kind: PullRequestStatus,
}

impl Status {
    pub fn is_merged(&self) -> bool {
        self.kind == PullRequestStatus::Merged
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub team: TeamName,
    pub is_active: bool,
}

/// A member supplied when creating a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTeamMember {
    pub id: UserId,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub name: TeamName,
    pub members: Vec<User>,
}

/// A pull request as proposed by the caller, before reviewers are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub id: PullRequestId,
    pub name: String,
    pub author_id: UserId,
}

/// Columns of the `pull_requests` row as returned by an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRow {
    pub id: PullRequestId,
    pub name: String,
    pub author_id: UserId,
    pub status_id: StatusId,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

/// A fully populated pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub id: PullRequestId,
    pub name: String,
    pub author_id: UserId,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    /// Assigned reviewers, ordered by id.
    pub reviewers: Vec<UserId>,
}

impl PullRequest {
    pub(crate) fn from_row(row: PullRequestRow, status: Status, reviewers: Vec<UserId>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            author_id: row.author_id,
            status,
            created_at: row.created_at,
            merged_at: row.merged_at,
            reviewers,
        }
    }
}

/// Listing form of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestShort {
    pub id: PullRequestId,
    pub name: String,
    pub author_id: UserId,
    pub status: PullRequestStatus,
}

/// An open pull request reviewed by at least one user being deactivated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedPullRequest {
    pub author_id: UserId,
    /// Reviewers on this pull request that are in the deactivation set,
    /// ordered by id.
    pub deactivated_reviewers: Vec<UserId>,
    /// Every current reviewer, ordered by id.
    pub all_reviewers: Vec<UserId>,
}

/// Reviewer swaps to apply to one pull request (old reviewer -> new reviewer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestReassignment {
    pub pull_request_id: PullRequestId,
    pub replacements: BTreeMap<UserId, UserId>,
}

/// Parameters of the team-scoped active-user lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableReviewersQuery {
    pub team: TeamName,
    pub exclude: BTreeSet<UserId>,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAssignmentCount {
    pub user_id: UserId,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestAssignmentCount {
    pub pull_request_id: PullRequestId,
    pub count: i64,
}

/// Reviewer-assignment counts, each list ordered by count descending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentStatistics {
    pub by_user: Vec<UserAssignmentCount>,
    pub by_pull_request: Vec<PullRequestAssignmentCount>,
}
