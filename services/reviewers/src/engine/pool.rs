//! Reviewer pool selection.

use std::collections::BTreeSet;
use std::sync::Arc;

use reviewers_id::{TeamName, UserId};

use super::ReviewError;
use crate::store::{AvailableReviewersQuery, MembershipStore};

/// Chooses eligible reviewers from a team.
///
/// Candidates are active members of the team that are not excluded. The
/// order among eligible candidates carries no fairness or recency meaning;
/// both stores happen to return them by id.
#[derive(Clone)]
pub struct ReviewerPool {
    membership: Arc<dyn MembershipStore>,
}

impl ReviewerPool {
    pub fn new(membership: Arc<dyn MembershipStore>) -> Self {
        Self { membership }
    }

    /// Returns up to `count` eligible user ids. Fewer, including none, when
    /// the pool is exhausted.
    pub async fn select_available(
        &self,
        team: &TeamName,
        exclude: BTreeSet<UserId>,
        count: usize,
    ) -> Result<Vec<UserId>, ReviewError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let query = AvailableReviewersQuery {
            team: team.clone(),
            exclude,
            limit: count,
        };
        self.membership
            .find_available_reviewers(&query)
            .await
            .map_err(ReviewError::during("find available reviewers"))
    }
}
