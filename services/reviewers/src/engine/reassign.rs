use std::collections::BTreeSet;

use reviewers_id::{PullRequestId, UserId};
use tracing::{info, instrument, warn};

use super::{ReviewError, ReviewerEngine};
use crate::db::DbError;
use crate::store::PullRequest;

/// Outcome of a single reviewer swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassigned {
    pub pull_request: PullRequest,
    pub replaced_by: UserId,
}

impl ReviewerEngine {
    /// Replaces one reviewer of an open pull request with another active
    /// member of the outgoing reviewer's team.
    ///
    /// The replacement is never the author, the outgoing reviewer, or a
    /// reviewer already on the pull request.
    #[instrument(skip(self), fields(pull_request_id = %id, old_reviewer_id = %old_reviewer))]
    pub async fn reassign_reviewer(
        &self,
        id: &PullRequestId,
        old_reviewer: &UserId,
    ) -> Result<Reassigned, ReviewError> {
        let pr = self
            .pull_requests
            .get_pull_request(id)
            .await
            .map_err(ReviewError::during("load pull request"))?;
        if pr.status.is_merged() {
            return Err(ReviewError::PrMerged(id.to_string()));
        }

        let team = self
            .membership
            .get_user_team(old_reviewer)
            .await
            .map_err(|e| match e {
                DbError::UserNotFound(_) => ReviewError::not_found("reviewer not found"),
                e => ReviewError::store("resolve reviewer team", e),
            })?;

        let current = self
            .pull_requests
            .get_reviewers(id)
            .await
            .map_err(ReviewError::during("load reviewers"))?;
        if !current.contains(old_reviewer) {
            return Err(not_assigned(id, old_reviewer));
        }

        let mut exclude: BTreeSet<UserId> = current.into_iter().collect();
        exclude.insert(old_reviewer.clone());
        exclude.insert(pr.author_id.clone());

        let replacement = self
            .pool
            .select_available(&team, exclude, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ReviewError::NoCandidate(team.to_string()))?;

        let mut tx = self
            .transactions
            .begin()
            .await
            .map_err(ReviewError::during("begin transaction"))?;
        let removed = tx
            .delete_reviewer(id, old_reviewer)
            .await
            .map_err(ReviewError::during("remove reviewer"))?;
        if removed == 0 {
            warn!("Reviewer was removed concurrently; aborting reassignment");
            return Err(not_assigned(id, old_reviewer));
        }
        tx.insert_reviewers(id, std::slice::from_ref(&replacement))
            .await
            .map_err(ReviewError::during("add reviewer"))?;
        tx.commit()
            .await
            .map_err(ReviewError::during("commit reassignment"))?;

        let pull_request = self
            .pull_requests
            .get_pull_request(id)
            .await
            .map_err(ReviewError::during("reload pull request"))?;

        info!(new_reviewer_id = %replacement, "Reviewer reassigned");
        Ok(Reassigned {
            pull_request,
            replaced_by: replacement,
        })
    }
}

fn not_assigned(id: &PullRequestId, reviewer: &UserId) -> ReviewError {
    ReviewError::NotAssigned {
        pull_request_id: id.to_string(),
        reviewer_id: reviewer.to_string(),
    }
}
