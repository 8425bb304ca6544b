//! Writes inside a single Postgres transaction.
//!
//! `sqlx::Transaction` rolls back when dropped without `commit`, so an
//! abandoned unit of work leaves no trace.

use async_trait::async_trait;
use reviewers_id::{PullRequestId, TeamName, UserId};
use sqlx::{Postgres, Transaction};
use tracing::debug;

use super::rows::{
    id_strings, user_ids, PullRequestRecord, UserRecord, PULL_REQUEST_COLUMNS, USER_COLUMNS,
};
use super::DbError;
use crate::store::{
    dedup_new_reviewers, MembershipWriter, NewPullRequest, NewTeamMember,
    PullRequestReassignment, PullRequestRow, PullRequestWriter, Status, StoreResult, UnitOfWork,
    User,
};

pub(super) struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    pub(super) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl MembershipWriter for PgUnitOfWork {
    async fn insert_team(&mut self, team: &TeamName) -> StoreResult<()> {
        sqlx::query("INSERT INTO teams (team_name) VALUES ($1)")
            .bind(team.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if DbError::is_unique_violation(&e) {
                    return DbError::TeamExists(team.to_string());
                }
                DbError::Query(e)
            })?;
        Ok(())
    }

    async fn upsert_users(
        &mut self,
        team: &TeamName,
        members: &[NewTeamMember],
    ) -> StoreResult<Vec<User>> {
        let mut upserted = Vec::with_capacity(members.len());

        for member in members {
            let record = sqlx::query_as::<_, UserRecord>(&format!(
                r#"
                INSERT INTO users (user_id, username, team_name, is_active)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id) DO UPDATE
                SET username = EXCLUDED.username,
                    team_name = EXCLUDED.team_name,
                    is_active = EXCLUDED.is_active
                RETURNING {USER_COLUMNS}
                "#
            ))
            .bind(member.id.as_str())
            .bind(&member.username)
            .bind(team.as_str())
            .bind(member.is_active)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                if DbError::is_foreign_key_violation(&e) {
                    return DbError::TeamNotFound(team.to_string());
                }
                DbError::Query(e)
            })?;

            upserted.push(User::try_from(record)?);
        }

        Ok(upserted)
    }

    async fn set_user_active(&mut self, user_id: &UserId, is_active: bool) -> StoreResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET is_active = $2 WHERE user_id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id.as_str())
        .bind(is_active)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::Query)?
        .ok_or_else(|| DbError::UserNotFound(user_id.to_string()))?;

        User::try_from(record)
    }

    async fn deactivate_users(
        &mut self,
        team: &TeamName,
        ids: &[UserId],
    ) -> StoreResult<Vec<UserId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let flipped: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET is_active = false
            WHERE team_name = $1
              AND is_active
              AND user_id = ANY($2)
            RETURNING user_id
            "#,
        )
        .bind(team.as_str())
        .bind(id_strings(ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::Query)?;

        let mut flipped = user_ids(flipped)?;
        flipped.sort();
        Ok(flipped)
    }
}

#[async_trait]
impl PullRequestWriter for PgUnitOfWork {
    async fn insert_pull_request(
        &mut self,
        pr: &NewPullRequest,
        status: &Status,
    ) -> StoreResult<PullRequestRow> {
        let record = sqlx::query_as::<_, PullRequestRecord>(&format!(
            r#"
            INSERT INTO pull_requests (pr_id, pr_name, author_id, status_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {PULL_REQUEST_COLUMNS}
            "#
        ))
        .bind(pr.id.as_str())
        .bind(&pr.name)
        .bind(pr.author_id.as_str())
        .bind(status.id.value())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if DbError::is_unique_violation(&e) {
                return DbError::PullRequestExists(pr.id.to_string());
            }
            if DbError::is_foreign_key_violation(&e) {
                return DbError::UserNotFound(pr.author_id.to_string());
            }
            DbError::Query(e)
        })?;

        PullRequestRow::try_from(record)
    }

    async fn set_status(&mut self, id: &PullRequestId, status: &Status) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE pull_requests
            SET status_id = $2,
                merged_at = CASE WHEN $3 THEN COALESCE(merged_at, now()) ELSE merged_at END
            WHERE pr_id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(status.id.value())
        .bind(status.is_merged())
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::Query)?;

        Ok(result.rows_affected())
    }

    async fn insert_reviewers(
        &mut self,
        id: &PullRequestId,
        reviewers: &[UserId],
    ) -> StoreResult<()> {
        if reviewers.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO reviewers (pr_id, reviewer_id)
            SELECT $1, UNNEST($2::text[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id.as_str())
        .bind(id_strings(reviewers))
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::Query)?;

        Ok(())
    }

    async fn delete_reviewer(&mut self, id: &PullRequestId, reviewer: &UserId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM reviewers WHERE pr_id = $1 AND reviewer_id = $2")
            .bind(id.as_str())
            .bind(reviewer.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::Query)?;

        Ok(result.rows_affected())
    }

    async fn bulk_reassign(
        &mut self,
        reassignments: &[PullRequestReassignment],
    ) -> StoreResult<()> {
        for reassignment in reassignments {
            if reassignment.replacements.is_empty() {
                continue;
            }

            let removed = sqlx::query(
                "DELETE FROM reviewers WHERE pr_id = $1 AND reviewer_id = ANY($2)",
            )
            .bind(reassignment.pull_request_id.as_str())
            .bind(id_strings(reassignment.replacements.keys()))
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::Query)?;

            let added = dedup_new_reviewers(&reassignment.replacements);
            debug!(
                pull_request_id = %reassignment.pull_request_id,
                removed = removed.rows_affected(),
                added = added.len(),
                "Reassigning reviewers"
            );
            self.insert_reviewers(&reassignment.pull_request_id, &added)
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(DbError::Query)
    }
}
