//! Store error types.
//!
//! Shared by the Postgres store and the in-memory store so that services see
//! the same sentinels regardless of backend.

use reviewers_id::IdError;
use thiserror::Error;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or services/reviewers.")]
    MigrationDirNotFound { tried: String, last_error: String },

    /// A stored identifier failed validation.
    #[error("stored identifier is invalid: {0}")]
    InvalidId(#[from] IdError),

    /// A stored row could not be interpreted.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// No user with this id.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// No team with this name.
    #[error("team not found: {0}")]
    TeamNotFound(String),

    /// No pull request with this id.
    #[error("pull request not found: {0}")]
    PullRequestNotFound(String),

    /// Pull request id collision on insert.
    #[error("pull request already exists: {0}")]
    PullRequestExists(String),

    /// Team name collision on insert.
    #[error("team already exists: {0}")]
    TeamExists(String),

    /// Status lookup by name or id found no row.
    #[error("pull request status not found: {0}")]
    StatusNotFound(String),

    /// Injected failure (in-memory store only).
    #[error("injected failure: {0}")]
    Injected(&'static str),
}

impl DbError {
    /// Returns true for a Postgres unique violation (SQLSTATE 23505).
    pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
            _ => false,
        }
    }

    /// Returns true for a Postgres foreign key violation (SQLSTATE 23503).
    pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
            _ => false,
        }
    }
}
