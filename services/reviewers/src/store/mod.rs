//! Store contracts consumed by the reviewer engine.
//!
//! Reads go through [`StatusDirectory`], [`MembershipStore`] and
//! [`PullRequestStore`] and see committed state. Writes are only reachable
//! through a [`UnitOfWork`] obtained from [`TransactionProvider::begin`].
//! A unit of work that is dropped without [`UnitOfWork::commit`] is rolled
//! back, whether the caller returned early, panicked, or had its future
//! cancelled.
//!
//! Two backends implement every contract: [`crate::db::PgStore`] and
//! [`InMemoryStore`].

mod memory;
pub mod models;

pub use memory::InMemoryStore;
pub use models::*;

use std::collections::BTreeMap;

use async_trait::async_trait;
use reviewers_id::{PullRequestId, StatusId, TeamName, UserId};

use crate::db::DbError;

pub type StoreResult<T> = Result<T, DbError>;

/// Resolves pull request statuses between name and stored id.
#[async_trait]
pub trait StatusDirectory: Send + Sync {
    /// Returns `DbError::StatusNotFound` if no status has this name.
    async fn status_by_name(&self, name: &str) -> StoreResult<Status>;

    /// Returns `DbError::StatusNotFound` if no status has this id.
    async fn status_by_id(&self, id: StatusId) -> StoreResult<Status>;
}

/// Team affiliation and activity reads.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// All members of a team, active or not, ordered by id.
    async fn find_team_members(&self, team: &TeamName) -> StoreResult<Vec<User>>;

    /// Active members of a team, ordered by id.
    async fn find_active_team_members(&self, team: &TeamName) -> StoreResult<Vec<UserId>>;

    /// Returns `DbError::UserNotFound` for unknown users.
    async fn get_user_team(&self, user_id: &UserId) -> StoreResult<TeamName>;

    /// Returns `DbError::UserNotFound` for unknown users.
    async fn get_user(&self, user_id: &UserId) -> StoreResult<User>;

    async fn team_exists(&self, team: &TeamName) -> StoreResult<bool>;

    /// Up to `query.limit` active members of `query.team` outside
    /// `query.exclude`, ordered by id.
    async fn find_available_reviewers(
        &self,
        query: &AvailableReviewersQuery,
    ) -> StoreResult<Vec<UserId>>;
}

/// Pull request and reviewer-assignment reads.
#[async_trait]
pub trait PullRequestStore: Send + Sync {
    async fn pull_request_exists(&self, id: &PullRequestId) -> StoreResult<bool>;

    /// Returns `DbError::PullRequestNotFound` if absent.
    async fn get_pull_request(&self, id: &PullRequestId) -> StoreResult<PullRequest>;

    /// Current reviewers ordered by id.
    async fn get_reviewers(&self, id: &PullRequestId) -> StoreResult<Vec<UserId>>;

    /// Open pull requests reviewed by at least one of `reviewer_ids`.
    async fn get_open_prs_with_reviewers(
        &self,
        reviewer_ids: &[UserId],
    ) -> StoreResult<BTreeMap<PullRequestId, AffectedPullRequest>>;

    /// Pull requests the user currently reviews, ordered by id.
    async fn find_by_reviewer(&self, reviewer_id: &UserId) -> StoreResult<Vec<PullRequestShort>>;

    async fn assignment_statistics(&self) -> StoreResult<AssignmentStatistics>;
}

/// Writes to users and teams.
#[async_trait]
pub trait MembershipWriter: Send {
    /// Returns `DbError::TeamExists` if the team is already present.
    async fn insert_team(&mut self, team: &TeamName) -> StoreResult<()>;

    /// Inserts or updates each member, moving it into `team`.
    async fn upsert_users(
        &mut self,
        team: &TeamName,
        members: &[NewTeamMember],
    ) -> StoreResult<Vec<User>>;

    /// Returns `DbError::UserNotFound` for unknown users.
    async fn set_user_active(&mut self, user_id: &UserId, is_active: bool) -> StoreResult<User>;

    /// Deactivates the listed users that belong to `team` and are currently
    /// active. Returns the ids actually flipped, ordered by id.
    async fn deactivate_users(
        &mut self,
        team: &TeamName,
        user_ids: &[UserId],
    ) -> StoreResult<Vec<UserId>>;
}

/// Writes to pull requests and the reviewer join relation.
#[async_trait]
pub trait PullRequestWriter: Send {
    /// Returns `DbError::PullRequestExists` on id collision.
    async fn insert_pull_request(
        &mut self,
        pr: &NewPullRequest,
        status: &Status,
    ) -> StoreResult<PullRequestRow>;

    /// Sets the status. When `status` is MERGED, `merged_at` is set to now
    /// only if it is currently unset. Returns rows affected.
    async fn set_status(&mut self, id: &PullRequestId, status: &Status) -> StoreResult<u64>;

    /// Attaches reviewers; rows that already exist are left as they are.
    async fn insert_reviewers(&mut self, id: &PullRequestId, reviewers: &[UserId])
        -> StoreResult<()>;

    /// Returns rows affected (0 or 1).
    async fn delete_reviewer(&mut self, id: &PullRequestId, reviewer: &UserId) -> StoreResult<u64>;

    /// For each pull request, removes the old reviewers then inserts the new
    /// ones. New reviewer ids are deduplicated per pull request.
    async fn bulk_reassign(&mut self, reassignments: &[PullRequestReassignment])
        -> StoreResult<()>;
}

/// One atomic unit of work spanning membership and pull request writes.
#[async_trait]
pub trait UnitOfWork: MembershipWriter + PullRequestWriter {
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait TransactionProvider: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

/// A backend implementing every store contract.
#[async_trait]
pub trait Backend:
    StatusDirectory + MembershipStore + PullRequestStore + TransactionProvider + 'static
{
    /// Cheap liveness probe for readiness checks.
    async fn health_check(&self) -> StoreResult<()>;
}

/// Deduplicates the new reviewer ids of one reassignment, keeping first
/// occurrence order of the replacement map.
pub(crate) fn dedup_new_reviewers(replacements: &BTreeMap<UserId, UserId>) -> Vec<UserId> {
    let mut seen = std::collections::BTreeSet::new();
    replacements
        .values()
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}
