use std::collections::BTreeSet;

use tracing::{info, instrument};

use super::{ReviewError, ReviewerEngine, INITIAL_REVIEWERS};
use crate::db::DbError;
use crate::store::{NewPullRequest, PullRequest, PullRequestStatus};

impl ReviewerEngine {
    /// Creates a pull request and assigns up to two reviewers from the
    /// author's team.
    ///
    /// The pull request row and its reviewer rows are written together or
    /// not at all.
    #[instrument(skip(self, pr), fields(pull_request_id = %pr.id, author_id = %pr.author_id))]
    pub async fn create_pull_request(&self, pr: NewPullRequest) -> Result<PullRequest, ReviewError> {
        let open = self
            .statuses
            .status_by_name(PullRequestStatus::Open.as_str())
            .await
            .map_err(ReviewError::during("resolve OPEN status"))?;

        let team = self
            .membership
            .get_user_team(&pr.author_id)
            .await
            .map_err(|e| match e {
                DbError::UserNotFound(_) => ReviewError::not_found("author not found"),
                e => ReviewError::store("resolve author team", e),
            })?;

        let exclude = BTreeSet::from([pr.author_id.clone()]);
        let mut reviewers = self
            .pool
            .select_available(&team, exclude, INITIAL_REVIEWERS)
            .await?;
        if reviewers.is_empty() {
            return Err(ReviewError::not_found("no available reviewers found"));
        }
        reviewers.sort();

        let mut tx = self
            .transactions
            .begin()
            .await
            .map_err(ReviewError::during("begin transaction"))?;
        let row = tx
            .insert_pull_request(&pr, &open)
            .await
            .map_err(ReviewError::during("insert pull request"))?;
        tx.insert_reviewers(&pr.id, &reviewers)
            .await
            .map_err(ReviewError::during("attach reviewers"))?;
        tx.commit()
            .await
            .map_err(ReviewError::during("commit pull request"))?;

        info!(team = %team, reviewers = reviewers.len(), "Pull request created");
        Ok(PullRequest::from_row(row, open, reviewers))
    }
}
