//! Postgres implementation of the read contracts and the transaction
//! provider.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use reviewers_id::{PullRequestId, StatusId, TeamName, UserId};
use sqlx::{postgres::PgPool, Row};

use super::rows::{
    id_strings, user_ids, PullRequestRecord, StatusRecord, UserRecord, PULL_REQUEST_COLUMNS,
    USER_COLUMNS,
};
use super::unit_of_work::PgUnitOfWork;
use super::DbError;
use crate::store::{
    AffectedPullRequest, AssignmentStatistics, AvailableReviewersQuery, Backend, MembershipStore,
    PullRequest, PullRequestAssignmentCount, PullRequestRow, PullRequestShort, PullRequestStatus,
    PullRequestStore, Status, StatusDirectory, StoreResult, TransactionProvider, UnitOfWork, User,
    UserAssignmentCount,
};

/// Store backed by a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusDirectory for PgStore {
    async fn status_by_name(&self, name: &str) -> StoreResult<Status> {
        let record = sqlx::query_as::<_, StatusRecord>(
            "SELECT status_id, status_name FROM statuses WHERE status_name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?
        .ok_or_else(|| DbError::StatusNotFound(name.to_string()))?;

        Status::try_from(record)
    }

    async fn status_by_id(&self, id: StatusId) -> StoreResult<Status> {
        let record = sqlx::query_as::<_, StatusRecord>(
            "SELECT status_id, status_name FROM statuses WHERE status_id = $1",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?
        .ok_or_else(|| DbError::StatusNotFound(id.to_string()))?;

        Status::try_from(record)
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn find_team_members(&self, team: &TeamName) -> StoreResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE team_name = $1 ORDER BY user_id"
        ))
        .bind(team.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        records.into_iter().map(User::try_from).collect()
    }

    async fn find_active_team_members(&self, team: &TeamName) -> StoreResult<Vec<UserId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM users WHERE team_name = $1 AND is_active ORDER BY user_id",
        )
        .bind(team.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        user_ids(ids)
    }

    async fn get_user_team(&self, user_id: &UserId) -> StoreResult<TeamName> {
        let team: Option<String> =
            sqlx::query_scalar("SELECT team_name FROM users WHERE user_id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::Query)?;

        let team = team.ok_or_else(|| DbError::UserNotFound(user_id.to_string()))?;
        Ok(TeamName::try_from(team)?)
    }

    async fn get_user(&self, user_id: &UserId) -> StoreResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?
        .ok_or_else(|| DbError::UserNotFound(user_id.to_string()))?;

        User::try_from(record)
    }

    async fn team_exists(&self, team: &TeamName) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM teams WHERE team_name = $1)")
            .bind(team.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    async fn find_available_reviewers(
        &self,
        query: &AvailableReviewersQuery,
    ) -> StoreResult<Vec<UserId>> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT user_id
            FROM users
            WHERE team_name = $1
              AND is_active
              AND NOT (user_id = ANY($2))
            ORDER BY user_id
            LIMIT $3
            "#,
        )
        .bind(query.team.as_str())
        .bind(id_strings(&query.exclude))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        user_ids(ids)
    }
}

#[async_trait]
impl PullRequestStore for PgStore {
    async fn pull_request_exists(&self, id: &PullRequestId) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM pull_requests WHERE pr_id = $1)")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    async fn get_pull_request(&self, id: &PullRequestId) -> StoreResult<PullRequest> {
        let record = sqlx::query_as::<_, PullRequestRecord>(&format!(
            "SELECT {PULL_REQUEST_COLUMNS} FROM pull_requests WHERE pr_id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?
        .ok_or_else(|| DbError::PullRequestNotFound(id.to_string()))?;

        let row = PullRequestRow::try_from(record)?;
        let status = self.status_by_id(row.status_id).await?;
        let reviewers = self.get_reviewers(id).await?;
        Ok(PullRequest::from_row(row, status, reviewers))
    }

    async fn get_reviewers(&self, id: &PullRequestId) -> StoreResult<Vec<UserId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT reviewer_id FROM reviewers WHERE pr_id = $1 ORDER BY reviewer_id",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        user_ids(ids)
    }

    async fn get_open_prs_with_reviewers(
        &self,
        reviewer_ids: &[UserId],
    ) -> StoreResult<BTreeMap<PullRequestId, AffectedPullRequest>> {
        if reviewer_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT p.pr_id, p.author_id, r.reviewer_id
            FROM pull_requests p
            JOIN statuses s ON s.status_id = p.status_id
            JOIN reviewers r ON r.pr_id = p.pr_id
            WHERE s.status_name = 'OPEN'
              AND p.pr_id IN (SELECT pr_id FROM reviewers WHERE reviewer_id = ANY($1))
            ORDER BY p.pr_id, r.reviewer_id
            "#,
        )
        .bind(id_strings(reviewer_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let wanted: BTreeSet<&UserId> = reviewer_ids.iter().collect();
        let mut affected: BTreeMap<PullRequestId, AffectedPullRequest> = BTreeMap::new();

        for row in rows {
            let pr_id: String = row.try_get("pr_id").map_err(DbError::Query)?;
            let author_id: String = row.try_get("author_id").map_err(DbError::Query)?;
            let reviewer: String = row.try_get("reviewer_id").map_err(DbError::Query)?;
            let pr_id = PullRequestId::try_from(pr_id)?;
            let author_id = UserId::try_from(author_id)?;
            let reviewer = UserId::try_from(reviewer)?;

            let entry = affected.entry(pr_id).or_insert_with(|| AffectedPullRequest {
                author_id,
                deactivated_reviewers: Vec::new(),
                all_reviewers: Vec::new(),
            });
            if wanted.contains(&reviewer) {
                entry.deactivated_reviewers.push(reviewer.clone());
            }
            entry.all_reviewers.push(reviewer);
        }

        Ok(affected)
    }

    async fn find_by_reviewer(&self, reviewer_id: &UserId) -> StoreResult<Vec<PullRequestShort>> {
        let rows = sqlx::query(
            r#"
            SELECT p.pr_id, p.pr_name, p.author_id, s.status_name
            FROM reviewers r
            JOIN pull_requests p ON p.pr_id = r.pr_id
            JOIN statuses s ON s.status_id = p.status_id
            WHERE r.reviewer_id = $1
            ORDER BY p.pr_id
            "#,
        )
        .bind(reviewer_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        rows.into_iter()
            .map(|row| -> StoreResult<PullRequestShort> {
                let status_name: String = row.try_get("status_name").map_err(DbError::Query)?;
                let status = PullRequestStatus::from_name(&status_name).ok_or_else(|| {
                    DbError::InvalidRow(format!("unknown status name {status_name}"))
                })?;
                Ok(PullRequestShort {
                    id: PullRequestId::try_from(
                        row.try_get::<String, _>("pr_id").map_err(DbError::Query)?,
                    )?,
                    name: row.try_get("pr_name").map_err(DbError::Query)?,
                    author_id: UserId::try_from(
                        row.try_get::<String, _>("author_id").map_err(DbError::Query)?,
                    )?,
                    status,
                })
            })
            .collect()
    }

    async fn assignment_statistics(&self) -> StoreResult<AssignmentStatistics> {
        let by_user = sqlx::query(
            r#"
            SELECT reviewer_id, COUNT(*) AS assignments
            FROM reviewers
            GROUP BY reviewer_id
            ORDER BY assignments DESC, reviewer_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let by_pull_request = sqlx::query(
            r#"
            SELECT pr_id, COUNT(*) AS assignments
            FROM reviewers
            GROUP BY pr_id
            ORDER BY assignments DESC, pr_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let by_user = by_user
            .into_iter()
            .map(|row| -> StoreResult<UserAssignmentCount> {
                Ok(UserAssignmentCount {
                    user_id: UserId::try_from(
                        row.try_get::<String, _>("reviewer_id").map_err(DbError::Query)?,
                    )?,
                    count: row.try_get("assignments").map_err(DbError::Query)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let by_pull_request = by_pull_request
            .into_iter()
            .map(|row| -> StoreResult<PullRequestAssignmentCount> {
                Ok(PullRequestAssignmentCount {
                    pull_request_id: PullRequestId::try_from(
                        row.try_get::<String, _>("pr_id").map_err(DbError::Query)?,
                    )?,
                    count: row.try_get("assignments").map_err(DbError::Query)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(AssignmentStatistics {
            by_user,
            by_pull_request,
        })
    }
}

#[async_trait]
impl TransactionProvider for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(DbError::Query)?;
        Ok(Box::new(PgUnitOfWork::new(tx)))
    }
}

#[async_trait]
impl Backend for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }
}
