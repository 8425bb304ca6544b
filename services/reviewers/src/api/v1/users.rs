//! User endpoints: activity flag, review listing, bulk deactivation.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use reviewers_id::{PullRequestId, TeamName, UserId};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::api::authz::require_admin;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::engine::BulkDeactivation;
use crate::state::AppState;
use crate::store::{PullRequestShort, PullRequestStatus, User};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/setIsActive", post(set_is_active))
        .route("/getReview", get(get_review))
        .route("/bulkDeactivate", post(bulk_deactivate))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SetIsActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct GetReviewQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeactivateRequest {
    pub team_name: String,
    pub user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: UserId,
    pub username: String,
    pub team_name: TeamName,
    pub is_active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            team_name: user.team,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct PullRequestShortResponse {
    pub pull_request_id: PullRequestId,
    pub pull_request_name: String,
    pub author_id: UserId,
    pub status: PullRequestStatus,
}

impl From<PullRequestShort> for PullRequestShortResponse {
    fn from(pr: PullRequestShort) -> Self {
        Self {
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            status: pr.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserReviewsResponse {
    pub user_id: UserId,
    pub pull_requests: Vec<PullRequestShortResponse>,
}

#[derive(Debug, Serialize)]
pub struct ReassignmentResponse {
    pub pull_request_id: PullRequestId,
    pub old_user_id: UserId,
    pub new_user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct BulkDeactivateResponse {
    pub deactivated_user_ids: Vec<UserId>,
    pub reassignments: Vec<ReassignmentResponse>,
}

impl From<BulkDeactivation> for BulkDeactivateResponse {
    fn from(result: BulkDeactivation) -> Self {
        Self {
            deactivated_user_ids: result.deactivated_user_ids,
            reassignments: result
                .reassignments
                .into_iter()
                .map(|r| ReassignmentResponse {
                    pull_request_id: r.pull_request_id,
                    old_user_id: r.old_reviewer_id,
                    new_user_id: r.new_reviewer_id,
                })
                .collect(),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /v1/users/setIsActive
async fn set_is_active(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<SetIsActiveRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    require_admin(&state, &ctx)?;
    let request_id = &ctx.request_id;

    let user_id: UserId = parse_id(&req.user_id, "user_id", request_id)?;
    let user = state
        .engine()
        .set_user_active(&user_id, req.is_active)
        .await
        .map_err(|e| ApiError::from_review(e, request_id))?;

    Ok(Json(UserEnvelope { user: user.into() }))
}

/// GET /v1/users/getReview?user_id=
async fn get_review(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<GetReviewQuery>,
) -> Result<Json<UserReviewsResponse>, ApiError> {
    let request_id = &ctx.request_id;

    let user_id: UserId = parse_id(&query.user_id, "user_id", request_id)?;
    let pull_requests = state
        .engine()
        .get_user_reviews(&user_id)
        .await
        .map_err(|e| ApiError::from_review(e, request_id))?;

    Ok(Json(UserReviewsResponse {
        user_id,
        pull_requests: pull_requests.into_iter().map(Into::into).collect(),
    }))
}

/// POST /v1/users/bulkDeactivate
async fn bulk_deactivate(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<BulkDeactivateRequest>,
) -> Result<Json<BulkDeactivateResponse>, ApiError> {
    require_admin(&state, &ctx)?;
    let request_id = &ctx.request_id;

    let team: TeamName = parse_id(&req.team_name, "team_name", request_id)?;
    let user_ids = req
        .user_ids
        .iter()
        .map(|raw| parse_id(raw, "user_ids", request_id))
        .collect::<Result<Vec<UserId>, ApiError>>()?;

    let result = state
        .engine()
        .deactivate_team_users(&team, &user_ids)
        .await
        .map_err(|e| ApiError::from_review(e, request_id))?;

    Ok(Json(result.into()))
}
