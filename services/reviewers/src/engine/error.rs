//! Domain error taxonomy for reviewer operations.

use thiserror::Error;

use crate::db::DbError;

/// Errors returned by [`super::ReviewerEngine`].
///
/// Store sentinels are translated into the matching kind; every other store
/// failure is wrapped as [`ReviewError::Internal`] with the step that failed.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// Referenced team, user or pull request does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Pull request id collision on creation.
    #[error("pull request {0} already exists")]
    AlreadyExists(String),

    /// Team name collision on creation.
    #[error("team {0} already exists")]
    TeamExists(String),

    /// Reviewer mutation attempted on a merged pull request.
    #[error("cannot reassign on merged pull request {0}")]
    PrMerged(String),

    /// The reviewer to replace is not on the pull request.
    #[error("reviewer {reviewer_id} is not assigned to pull request {pull_request_id}")]
    NotAssigned {
        pull_request_id: String,
        reviewer_id: String,
    },

    /// No active team member is eligible as a replacement.
    #[error("no active replacement candidate in team {0}")]
    NoCandidate(String),

    /// Status reference data is missing. Configuration error, not user input.
    #[error("pull request status not found: {0}")]
    StatusNotFound(String),

    #[error("{context}: {source}")]
    Internal {
        context: &'static str,
        #[source]
        source: DbError,
    },
}

impl ReviewError {
    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Translates a store error raised while performing `context`.
    pub(crate) fn store(context: &'static str, err: DbError) -> Self {
        match err {
            DbError::UserNotFound(_) => Self::not_found("user not found"),
            DbError::TeamNotFound(_) => Self::not_found("team not found"),
            DbError::PullRequestNotFound(_) => Self::not_found("pull request not found"),
            DbError::PullRequestExists(id) => Self::AlreadyExists(id),
            DbError::TeamExists(name) => Self::TeamExists(name),
            DbError::StatusNotFound(name) => Self::StatusNotFound(name),
            source => Self::Internal { context, source },
        }
    }

    /// Returns a mapper for `map_err` that translates store errors raised
    /// while performing `context`.
    pub(crate) fn during(context: &'static str) -> impl FnOnce(DbError) -> Self {
        move |err| Self::store(context, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_map_to_domain_kinds() {
        assert!(matches!(
            ReviewError::store("insert", DbError::PullRequestExists("pr-1".into())),
            ReviewError::AlreadyExists(id) if id == "pr-1"
        ));
        assert!(matches!(
            ReviewError::store("lookup", DbError::StatusNotFound("MERGED".into())),
            ReviewError::StatusNotFound(_)
        ));
        assert!(matches!(
            ReviewError::store("lookup", DbError::UserNotFound("u1".into())),
            ReviewError::NotFound(_)
        ));
    }

    #[test]
    fn test_other_failures_are_wrapped_with_context() {
        let err = ReviewError::store("bulk reassign", DbError::Injected("bulk_reassign"));
        match &err {
            ReviewError::Internal { context, .. } => assert_eq!(*context, "bulk reassign"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "bulk reassign: injected failure: bulk_reassign"
        );
    }
}
