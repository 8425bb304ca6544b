//! Assignment statistics endpoint.

use axum::{extract::State, routing::get, Json, Router};
use reviewers_id::{PullRequestId, UserId};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;
use crate::store::AssignmentStatistics;

pub fn routes() -> Router<AppState> {
    Router::new().route("/statistics", get(get_statistics))
}

#[derive(Debug, Serialize)]
pub struct UserAssignmentStat {
    pub user_id: UserId,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct PullRequestAssignmentStat {
    pub pull_request_id: PullRequestId,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub assignments_by_user: Vec<UserAssignmentStat>,
    pub assignments_by_pr: Vec<PullRequestAssignmentStat>,
}

impl From<AssignmentStatistics> for StatisticsResponse {
    fn from(stats: AssignmentStatistics) -> Self {
        Self {
            assignments_by_user: stats
                .by_user
                .into_iter()
                .map(|s| UserAssignmentStat {
                    user_id: s.user_id,
                    count: s.count,
                })
                .collect(),
            assignments_by_pr: stats
                .by_pull_request
                .into_iter()
                .map(|s| PullRequestAssignmentStat {
                    pull_request_id: s.pull_request_id,
                    count: s.count,
                })
                .collect(),
        }
    }
}

/// GET /v1/statistics
async fn get_statistics(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let stats = state
        .engine()
        .statistics()
        .await
        .map_err(|e| ApiError::from_review(e, &ctx.request_id))?;

    Ok(Json(stats.into()))
}
