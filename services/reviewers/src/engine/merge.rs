use reviewers_id::PullRequestId;
use tracing::{info, instrument};

use super::{ReviewError, ReviewerEngine};
use crate::store::{PullRequest, PullRequestStatus};

impl ReviewerEngine {
    /// Marks a pull request as merged.
    ///
    /// Idempotent: `merged_at` keeps the time of the first merge.
    #[instrument(skip(self), fields(pull_request_id = %id))]
    pub async fn merge_pull_request(&self, id: &PullRequestId) -> Result<PullRequest, ReviewError> {
        let exists = self
            .pull_requests
            .pull_request_exists(id)
            .await
            .map_err(ReviewError::during("check pull request"))?;
        if !exists {
            return Err(ReviewError::not_found("pull request not found"));
        }

        let merged = self
            .statuses
            .status_by_name(PullRequestStatus::Merged.as_str())
            .await
            .map_err(ReviewError::during("resolve MERGED status"))?;

        let mut tx = self
            .transactions
            .begin()
            .await
            .map_err(ReviewError::during("begin transaction"))?;
        let affected = tx
            .set_status(id, &merged)
            .await
            .map_err(ReviewError::during("set status"))?;
        if affected == 0 {
            return Err(ReviewError::not_found("pull request not found"));
        }
        tx.commit()
            .await
            .map_err(ReviewError::during("commit merge"))?;

        let pr = self
            .pull_requests
            .get_pull_request(id)
            .await
            .map_err(ReviewError::during("reload pull request"))?;

        info!(merged_at = ?pr.merged_at, "Pull request merged");
        Ok(pr)
    }
}
