//! In-memory implementation of the store contracts.
//!
//! Committed state lives behind a `RwLock` and is what readers see. A unit
//! of work takes the writer lock, stages a copy of the state, and publishes
//! it on commit. Dropping the unit of work discards the copy, which gives
//! the same all-or-nothing behavior as a database transaction. Writers are
//! serialized.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reviewers_id::{PullRequestId, StatusId, TeamName, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use super::{
    dedup_new_reviewers, AffectedPullRequest, AssignmentStatistics, AvailableReviewersQuery,
    Backend, MembershipStore, MembershipWriter, NewPullRequest, NewTeamMember, PullRequest,
    PullRequestAssignmentCount, PullRequestReassignment, PullRequestRow, PullRequestShort,
    PullRequestStatus, PullRequestStore, PullRequestWriter, Status, StatusDirectory, StoreResult,
    TransactionProvider, UnitOfWork, User, UserAssignmentCount,
};
use crate::db::DbError;

#[derive(Debug, Clone)]
struct State {
    statuses: Vec<Status>,
    teams: BTreeSet<TeamName>,
    users: BTreeMap<UserId, User>,
    pull_requests: BTreeMap<PullRequestId, PullRequestRow>,
    /// (pull request, reviewer) join rows.
    reviewers: BTreeSet<(PullRequestId, UserId)>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            statuses: vec![
                Status {
                    id: StatusId::new(1),
                    kind: PullRequestStatus::Open,
                },
                Status {
                    id: StatusId::new(2),
                    kind: PullRequestStatus::Merged,
                },
            ],
            teams: BTreeSet::new(),
            users: BTreeMap::new(),
            pull_requests: BTreeMap::new(),
            reviewers: BTreeSet::new(),
        }
    }
}

impl State {
    fn status_by_name(&self, name: &str) -> StoreResult<Status> {
        self.statuses
            .iter()
            .find(|s| s.kind.as_str() == name)
            .copied()
            .ok_or_else(|| DbError::StatusNotFound(name.to_string()))
    }

    fn status_by_id(&self, id: StatusId) -> StoreResult<Status> {
        self.statuses
            .iter()
            .find(|s| s.id == id)
            .copied()
            .ok_or_else(|| DbError::StatusNotFound(id.to_string()))
    }

    fn reviewers_of(&self, id: &PullRequestId) -> Vec<UserId> {
        self.reviewers
            .iter()
            .filter(|(pr_id, _)| pr_id == id)
            .map(|(_, reviewer)| reviewer.clone())
            .collect()
    }

    fn user(&self, user_id: &UserId) -> StoreResult<&User> {
        self.users
            .get(user_id)
            .ok_or_else(|| DbError::UserNotFound(user_id.to_string()))
    }
}

/// Failures the tests can arrange ahead of time.
#[derive(Debug, Default)]
struct Faults {
    fail_bulk_reassign: bool,
    remove_before_begin: Option<(PullRequestId, UserId)>,
}

/// In-memory store.
///
/// All state is lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    writer: Arc<Mutex<()>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `bulk_reassign` fail inside the next unit of work, after its
    /// earlier writes have been staged.
    pub async fn fail_next_bulk_reassign(&self) {
        self.faults.lock().await.fail_bulk_reassign = true;
    }

    /// Removes the join row from committed state right before the next unit
    /// of work begins, as a concurrent writer would.
    pub async fn remove_reviewer_before_next_transaction(
        &self,
        pull_request_id: PullRequestId,
        reviewer_id: UserId,
    ) {
        self.faults.lock().await.remove_before_begin = Some((pull_request_id, reviewer_id));
    }
}

#[async_trait]
impl StatusDirectory for InMemoryStore {
    async fn status_by_name(&self, name: &str) -> StoreResult<Status> {
        self.state.read().await.status_by_name(name)
    }

    async fn status_by_id(&self, id: StatusId) -> StoreResult<Status> {
        self.state.read().await.status_by_id(id)
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn find_team_members(&self, team: &TeamName) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| &u.team == team)
            .cloned()
            .collect())
    }

    async fn find_active_team_members(&self, team: &TeamName) -> StoreResult<Vec<UserId>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| &u.team == team && u.is_active)
            .map(|u| u.id.clone())
            .collect())
    }

    async fn get_user_team(&self, user_id: &UserId) -> StoreResult<TeamName> {
        let state = self.state.read().await;
        Ok(state.user(user_id)?.team.clone())
    }

    async fn get_user(&self, user_id: &UserId) -> StoreResult<User> {
        let state = self.state.read().await;
        state.user(user_id).cloned()
    }

    async fn team_exists(&self, team: &TeamName) -> StoreResult<bool> {
        Ok(self.state.read().await.teams.contains(team))
    }

    async fn find_available_reviewers(
        &self,
        query: &AvailableReviewersQuery,
    ) -> StoreResult<Vec<UserId>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.team == query.team && u.is_active && !query.exclude.contains(&u.id))
            .take(query.limit)
            .map(|u| u.id.clone())
            .collect())
    }
}

#[async_trait]
impl PullRequestStore for InMemoryStore {
    async fn pull_request_exists(&self, id: &PullRequestId) -> StoreResult<bool> {
        Ok(self.state.read().await.pull_requests.contains_key(id))
    }

    async fn get_pull_request(&self, id: &PullRequestId) -> StoreResult<PullRequest> {
        let state = self.state.read().await;
        let row = state
            .pull_requests
            .get(id)
            .cloned()
            .ok_or_else(|| DbError::PullRequestNotFound(id.to_string()))?;
        let status = state.status_by_id(row.status_id)?;
        let reviewers = state.reviewers_of(id);
        Ok(PullRequest::from_row(row, status, reviewers))
    }

    async fn get_reviewers(&self, id: &PullRequestId) -> StoreResult<Vec<UserId>> {
        Ok(self.state.read().await.reviewers_of(id))
    }

    async fn get_open_prs_with_reviewers(
        &self,
        reviewer_ids: &[UserId],
    ) -> StoreResult<BTreeMap<PullRequestId, AffectedPullRequest>> {
        let state = self.state.read().await;
        let wanted: BTreeSet<&UserId> = reviewer_ids.iter().collect();
        let mut affected = BTreeMap::new();

        for (id, row) in &state.pull_requests {
            if state.status_by_id(row.status_id)?.kind != PullRequestStatus::Open {
                continue;
            }

            let all_reviewers = state.reviewers_of(id);
            let deactivated_reviewers: Vec<UserId> = all_reviewers
                .iter()
                .filter(|r| wanted.contains(r))
                .cloned()
                .collect();

            if deactivated_reviewers.is_empty() {
                continue;
            }

            affected.insert(
                id.clone(),
                AffectedPullRequest {
                    author_id: row.author_id.clone(),
                    deactivated_reviewers,
                    all_reviewers,
                },
            );
        }

        Ok(affected)
    }

    async fn find_by_reviewer(&self, reviewer_id: &UserId) -> StoreResult<Vec<PullRequestShort>> {
        let state = self.state.read().await;
        let mut found = Vec::new();
        for (pr_id, reviewer) in &state.reviewers {
            if reviewer != reviewer_id {
                continue;
            }
            let Some(row) = state.pull_requests.get(pr_id) else {
                continue;
            };
            found.push(PullRequestShort {
                id: row.id.clone(),
                name: row.name.clone(),
                author_id: row.author_id.clone(),
                status: state.status_by_id(row.status_id)?.kind,
            });
        }
        Ok(found)
    }

    async fn assignment_statistics(&self) -> StoreResult<AssignmentStatistics> {
        let state = self.state.read().await;
        let mut by_user: BTreeMap<&UserId, i64> = BTreeMap::new();
        let mut by_pr: BTreeMap<&PullRequestId, i64> = BTreeMap::new();
        for (pr_id, reviewer) in &state.reviewers {
            *by_user.entry(reviewer).or_default() += 1;
            *by_pr.entry(pr_id).or_default() += 1;
        }

        let mut by_user: Vec<UserAssignmentCount> = by_user
            .into_iter()
            .map(|(user_id, count)| UserAssignmentCount {
                user_id: user_id.clone(),
                count,
            })
            .collect();
        // Stable sort keeps the id order among equal counts.
        by_user.sort_by(|a, b| b.count.cmp(&a.count));

        let mut by_pull_request: Vec<PullRequestAssignmentCount> = by_pr
            .into_iter()
            .map(|(pull_request_id, count)| PullRequestAssignmentCount {
                pull_request_id: pull_request_id.clone(),
                count,
            })
            .collect();
        by_pull_request.sort_by(|a, b| b.count.cmp(&a.count));

        Ok(AssignmentStatistics {
            by_user,
            by_pull_request,
        })
    }
}

#[async_trait]
impl TransactionProvider for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let writer = self.writer.clone().lock_owned().await;

        let (fail_bulk_reassign, remove_before_begin) = {
            let mut faults = self.faults.lock().await;
            (
                std::mem::take(&mut faults.fail_bulk_reassign),
                faults.remove_before_begin.take(),
            )
        };

        if let Some(row) = remove_before_begin {
            debug!(pull_request_id = %row.0, reviewer_id = %row.1, "Removing reviewer out of band");
            self.state.write().await.reviewers.remove(&row);
        }

        let staged = self.state.read().await.clone();

        Ok(Box::new(InMemoryUnitOfWork {
            staged,
            target: self.state.clone(),
            fail_bulk_reassign,
            _writer: writer,
        }))
    }
}

#[async_trait]
impl Backend for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Staged writes against a private copy of the state.
struct InMemoryUnitOfWork {
    staged: State,
    target: Arc<RwLock<State>>,
    fail_bulk_reassign: bool,
    _writer: OwnedMutexGuard<()>,
}

#[async_trait]
impl MembershipWriter for InMemoryUnitOfWork {
    async fn insert_team(&mut self, team: &TeamName) -> StoreResult<()> {
        if !self.staged.teams.insert(team.clone()) {
            return Err(DbError::TeamExists(team.to_string()));
        }
        Ok(())
    }

    async fn upsert_users(
        &mut self,
        team: &TeamName,
        members: &[NewTeamMember],
    ) -> StoreResult<Vec<User>> {
        if !self.staged.teams.contains(team) {
            return Err(DbError::TeamNotFound(team.to_string()));
        }

        let mut upserted = Vec::with_capacity(members.len());
        for member in members {
            let user = User {
                id: member.id.clone(),
                username: member.username.clone(),
                team: team.clone(),
                is_active: member.is_active,
            };
            self.staged.users.insert(user.id.clone(), user.clone());
            upserted.push(user);
        }
        Ok(upserted)
    }

    async fn set_user_active(&mut self, user_id: &UserId, is_active: bool) -> StoreResult<User> {
        let user = self
            .staged
            .users
            .get_mut(user_id)
            .ok_or_else(|| DbError::UserNotFound(user_id.to_string()))?;
        user.is_active = is_active;
        Ok(user.clone())
    }

    async fn deactivate_users(
        &mut self,
        team: &TeamName,
        user_ids: &[UserId],
    ) -> StoreResult<Vec<UserId>> {
        let wanted: BTreeSet<&UserId> = user_ids.iter().collect();
        let mut flipped = Vec::new();
        for user in self.staged.users.values_mut() {
            if &user.team == team && user.is_active && wanted.contains(&user.id) {
                user.is_active = false;
                flipped.push(user.id.clone());
            }
        }
        Ok(flipped)
    }
}

#[async_trait]
impl PullRequestWriter for InMemoryUnitOfWork {
    async fn insert_pull_request(
        &mut self,
        pr: &NewPullRequest,
        status: &Status,
    ) -> StoreResult<PullRequestRow> {
        if self.staged.pull_requests.contains_key(&pr.id) {
            return Err(DbError::PullRequestExists(pr.id.to_string()));
        }
        self.staged.user(&pr.author_id)?;

        let row = PullRequestRow {
            id: pr.id.clone(),
            name: pr.name.clone(),
            author_id: pr.author_id.clone(),
            status_id: status.id,
            created_at: Utc::now(),
            merged_at: None,
        };
        self.staged.pull_requests.insert(pr.id.clone(), row.clone());
        Ok(row)
    }

    async fn set_status(&mut self, id: &PullRequestId, status: &Status) -> StoreResult<u64> {
        let Some(row) = self.staged.pull_requests.get_mut(id) else {
            return Ok(0);
        };
        row.status_id = status.id;
        if status.is_merged() && row.merged_at.is_none() {
            row.merged_at = Some(Utc::now());
        }
        Ok(1)
    }

    async fn insert_reviewers(
        &mut self,
        id: &PullRequestId,
        reviewers: &[UserId],
    ) -> StoreResult<()> {
        if !self.staged.pull_requests.contains_key(id) {
            return Err(DbError::PullRequestNotFound(id.to_string()));
        }
        for reviewer in reviewers {
            self.staged.user(reviewer)?;
            self.staged.reviewers.insert((id.clone(), reviewer.clone()));
        }
        Ok(())
    }

    async fn delete_reviewer(&mut self, id: &PullRequestId, reviewer: &UserId) -> StoreResult<u64> {
        let removed = self.staged.reviewers.remove(&(id.clone(), reviewer.clone()));
        Ok(u64::from(removed))
    }

    async fn bulk_reassign(
        &mut self,
        reassignments: &[PullRequestReassignment],
    ) -> StoreResult<()> {
        if self.fail_bulk_reassign {
            return Err(DbError::Injected("bulk_reassign"));
        }

        for reassignment in reassignments {
            if reassignment.replacements.is_empty() {
                continue;
            }
            let pr_id = &reassignment.pull_request_id;
            for old in reassignment.replacements.keys() {
                self.staged.reviewers.remove(&(pr_id.clone(), old.clone()));
            }
            for new in dedup_new_reviewers(&reassignment.replacements) {
                self.staged.reviewers.insert((pr_id.clone(), new));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        *this.target.write().await = this.staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        s.parse().unwrap()
    }

    fn team() -> TeamName {
        "backend".parse().unwrap()
    }

    fn member(id: &str, is_active: bool) -> NewTeamMember {
        NewTeamMember {
            id: uid(id),
            username: format!("{id}-name"),
            is_active,
        }
    }

    async fn seeded(members: &[NewTeamMember]) -> InMemoryStore {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_team(&team()).await.unwrap();
        tx.upsert_users(&team(), members).await.unwrap();
        tx.commit().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_statuses_are_seeded() {
        let store = InMemoryStore::new();
        let open = store.status_by_name("OPEN").await.unwrap();
        let merged = store.status_by_name("MERGED").await.unwrap();
        assert_eq!(open.kind, PullRequestStatus::Open);
        assert_eq!(store.status_by_id(merged.id).await.unwrap(), merged);
        assert!(matches!(
            store.status_by_name("CLOSED").await,
            Err(DbError::StatusNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let store = seeded(&[member("u1", true)]).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.deactivate_users(&team(), &[uid("u1")]).await.unwrap();
            // dropped without commit
        }

        assert!(store.get_user(&uid("u1")).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_readers_do_not_see_staged_writes() {
        let store = seeded(&[member("u1", true)]).await;

        let mut tx = store.begin().await.unwrap();
        tx.set_user_active(&uid("u1"), false).await.unwrap();
        assert!(store.get_user(&uid("u1")).await.unwrap().is_active);

        tx.commit().await.unwrap();
        assert!(!store.get_user(&uid("u1")).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_available_reviewers_respects_exclusion_and_limit() {
        let store = seeded(&[
            member("u1", true),
            member("u2", true),
            member("u3", false),
            member("u4", true),
        ])
        .await;

        let query = AvailableReviewersQuery {
            team: team(),
            exclude: [uid("u1")].into_iter().collect(),
            limit: 5,
        };
        let found = store.find_available_reviewers(&query).await.unwrap();
        assert_eq!(found, vec![uid("u2"), uid("u4")]);

        let query = AvailableReviewersQuery { limit: 1, ..query };
        assert_eq!(store.find_available_reviewers(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deactivate_users_only_flips_active_team_members() {
        let store = seeded(&[member("u1", true), member("u2", false)]).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_team(&"frontend".parse().unwrap()).await.unwrap();
        tx.upsert_users(&"frontend".parse().unwrap(), &[member("f1", true)])
            .await
            .unwrap();
        let flipped = tx
            .deactivate_users(&team(), &[uid("u1"), uid("u2"), uid("f1")])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(flipped, vec![uid("u1")]);
        assert!(store.get_user(&uid("f1")).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_insert_team_twice_fails() {
        let store = seeded(&[]).await;
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.insert_team(&team()).await,
            Err(DbError::TeamExists(_))
        ));
    }
}
