//! Bulk deactivation of team members with reviewer repair.

use std::collections::{BTreeMap, BTreeSet};

use reviewers_id::{PullRequestId, TeamName, UserId};
use tracing::{debug, info, instrument};

use super::{ReviewError, ReviewerEngine};
use crate::store::{AffectedPullRequest, PullRequestReassignment};

/// One reviewer swap performed by a bulk deactivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    pub pull_request_id: PullRequestId,
    pub old_reviewer_id: UserId,
    pub new_reviewer_id: UserId,
}

/// Outcome of [`ReviewerEngine::deactivate_team_users`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeactivation {
    /// Users whose active flag was flipped, ordered by id.
    pub deactivated_user_ids: Vec<UserId>,
    pub reassignments: Vec<Reassignment>,
}

/// Reviewer swaps computed for a batch of affected pull requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassignmentPlan {
    /// Per pull request old -> new mappings to hand to the store.
    pub writes: Vec<PullRequestReassignment>,
    /// The same swaps, flattened for reporting.
    pub reassignments: Vec<Reassignment>,
}

/// Picks replacements for deactivated reviewers.
///
/// For each pull request the author and every current reviewer are
/// excluded. Candidates are drawn in order, one per deactivated reviewer,
/// and a drawn candidate is not reused on the same pull request. Slots left
/// over once the candidates run out stay empty.
pub fn plan_reassignments(
    affected: &BTreeMap<PullRequestId, AffectedPullRequest>,
    candidates: &[UserId],
) -> ReassignmentPlan {
    let mut plan = ReassignmentPlan::default();

    for (pr_id, pr) in affected {
        if pr.deactivated_reviewers.is_empty() {
            continue;
        }

        let mut exclude: BTreeSet<&UserId> = pr.all_reviewers.iter().collect();
        exclude.insert(&pr.author_id);

        let mut replacements = BTreeMap::new();
        let mut pool = candidates.iter();
        for old in &pr.deactivated_reviewers {
            let Some(new) = pool.by_ref().find(|c| !exclude.contains(c)) else {
                debug!(pull_request_id = %pr_id, reviewer_id = %old, "No replacement left");
                break;
            };
            exclude.insert(new);
            replacements.insert(old.clone(), new.clone());
            plan.reassignments.push(Reassignment {
                pull_request_id: pr_id.clone(),
                old_reviewer_id: old.clone(),
                new_reviewer_id: new.clone(),
            });
        }

        if !replacements.is_empty() {
            plan.writes.push(PullRequestReassignment {
                pull_request_id: pr_id.clone(),
                replacements,
            });
        }
    }

    plan
}

impl ReviewerEngine {
    /// Deactivates the requested members of `team` and repairs every open
    /// pull request they were reviewing, all in one unit of work.
    ///
    /// Requested ids that are not active members of the team are ignored.
    /// When none remain the call is a no-op.
    #[instrument(skip(self, user_ids), fields(team = %team, requested = user_ids.len()))]
    pub async fn deactivate_team_users(
        &self,
        team: &TeamName,
        user_ids: &[UserId],
    ) -> Result<BulkDeactivation, ReviewError> {
        if user_ids.is_empty() {
            return Ok(BulkDeactivation::default());
        }

        let members = self
            .membership
            .find_team_members(team)
            .await
            .map_err(ReviewError::during("load team members"))?;
        if members.is_empty() {
            let exists = self
                .membership
                .team_exists(team)
                .await
                .map_err(ReviewError::during("check team"))?;
            if !exists {
                return Err(ReviewError::not_found("team not found"));
            }
        }

        let requested: BTreeSet<&UserId> = user_ids.iter().collect();
        let (targets, candidates): (Vec<UserId>, Vec<UserId>) = members
            .into_iter()
            .filter(|u| u.is_active)
            .map(|u| u.id)
            .partition(|id| requested.contains(id));

        if targets.is_empty() {
            debug!("No active team members among requested ids");
            return Ok(BulkDeactivation::default());
        }

        let affected = self
            .pull_requests
            .get_open_prs_with_reviewers(&targets)
            .await
            .map_err(ReviewError::during("load affected pull requests"))?;

        let mut tx = self
            .transactions
            .begin()
            .await
            .map_err(ReviewError::during("begin transaction"))?;
        let deactivated_user_ids = tx
            .deactivate_users(team, &targets)
            .await
            .map_err(ReviewError::during("deactivate users"))?;

        let plan = plan_reassignments(&affected, &candidates);
        if !plan.writes.is_empty() {
            tx.bulk_reassign(&plan.writes)
                .await
                .map_err(ReviewError::during("bulk reassign reviewers"))?;
        }
        tx.commit()
            .await
            .map_err(ReviewError::during("commit bulk deactivation"))?;

        info!(
            deactivated = deactivated_user_ids.len(),
            affected_pull_requests = affected.len(),
            reassignments = plan.reassignments.len(),
            "Team users deactivated"
        );
        Ok(BulkDeactivation {
            deactivated_user_ids,
            reassignments: plan.reassignments,
        })
    }
}
