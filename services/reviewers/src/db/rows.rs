//! Raw rows and their conversion into typed records.
//!
//! Identifiers are stored as text and re-validated on the way out, so a
//! malformed row surfaces as `DbError::InvalidId` rather than a panic.

use chrono::{DateTime, Utc};
use reviewers_id::{PullRequestId, StatusId, TeamName, UserId};
use sqlx::{postgres::PgRow, Row};

use super::DbError;
use crate::store::{PullRequestRow, PullRequestStatus, Status, User};

pub(super) const USER_COLUMNS: &str = "user_id, username, team_name, is_active";

pub(super) const PULL_REQUEST_COLUMNS: &str =
    "pr_id, pr_name, author_id, status_id, created_at, merged_at";

#[derive(Debug, Clone)]
pub(super) struct StatusRecord {
    pub status_id: i64,
    pub status_name: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StatusRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            status_id: row.try_get("status_id")?,
            status_name: row.try_get("status_name")?,
        })
    }
}

impl TryFrom<StatusRecord> for Status {
    type Error = DbError;

    fn try_from(record: StatusRecord) -> Result<Self, Self::Error> {
        let kind = PullRequestStatus::from_name(&record.status_name).ok_or_else(|| {
            DbError::InvalidRow(format!("unknown status name {}", record.status_name))
        })?;
        Ok(Status {
            id: StatusId::new(record.status_id),
            kind,
        })
    }
}

#[derive(Debug, Clone)]
pub(super) struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for UserRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            team_name: row.try_get("team_name")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

impl TryFrom<UserRecord> for User {
    type Error = DbError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::try_from(record.user_id)?,
            username: record.username,
            team: TeamName::try_from(record.team_name)?,
            is_active: record.is_active,
        })
    }
}

#[derive(Debug, Clone)]
pub(super) struct PullRequestRecord {
    pub pr_id: String,
    pub pr_name: String,
    pub author_id: String,
    pub status_id: i64,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for PullRequestRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            pr_id: row.try_get("pr_id")?,
            pr_name: row.try_get("pr_name")?,
            author_id: row.try_get("author_id")?,
            status_id: row.try_get("status_id")?,
            created_at: row.try_get("created_at")?,
            merged_at: row.try_get("merged_at")?,
        })
    }
}

impl TryFrom<PullRequestRecord> for PullRequestRow {
    type Error = DbError;

    fn try_from(record: PullRequestRecord) -> Result<Self, Self::Error> {
        Ok(PullRequestRow {
            id: PullRequestId::try_from(record.pr_id)?,
            name: record.pr_name,
            author_id: UserId::try_from(record.author_id)?,
            status_id: StatusId::new(record.status_id),
            created_at: record.created_at,
            merged_at: record.merged_at,
        })
    }
}

/// Converts a column of text ids into typed user ids.
pub(super) fn user_ids(raw: Vec<String>) -> Result<Vec<UserId>, DbError> {
    raw.into_iter()
        .map(|id| UserId::try_from(id).map_err(DbError::from))
        .collect()
}

/// Converts typed ids into the text array bound to `ANY($n)` / `UNNEST`.
pub(super) fn id_strings<T: AsRef<str>>(ids: impl IntoIterator<Item = T>) -> Vec<String> {
    ids.into_iter().map(|id| id.as_ref().to_string()).collect()
}
