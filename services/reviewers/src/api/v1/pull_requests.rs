//! Pull request endpoints: create, merge, reassign.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use reviewers_id::{PullRequestId, UserId};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::api::authz::require_admin;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;
use crate::store::{NewPullRequest, PullRequest, PullRequestStatus};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_pull_request))
        .route("/merge", post(merge_pull_request))
        .route("/reassign", post(reassign_reviewer))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreatePullRequestRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MergePullRequestRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

#[derive(Debug, Serialize)]
pub struct PullRequestResponse {
    pub pull_request_id: PullRequestId,
    pub pull_request_name: String,
    pub author_id: UserId,
    pub status: PullRequestStatus,
    pub assigned_reviewers: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<PullRequest> for PullRequestResponse {
    fn from(pr: PullRequest) -> Self {
        Self {
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            status: pr.status.kind,
            assigned_reviewers: pr.reviewers,
            created_at: pr.created_at,
            merged_at: pr.merged_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PullRequestEnvelope {
    pub pr: PullRequestResponse,
}

#[derive(Debug, Serialize)]
pub struct ReassignResponse {
    pub pr: PullRequestResponse,
    pub replaced_by: UserId,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /v1/pullRequest/create
async fn create_pull_request(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreatePullRequestRequest>,
) -> Result<(StatusCode, Json<PullRequestEnvelope>), ApiError> {
    require_admin(&state, &ctx)?;
    let request_id = &ctx.request_id;

    if req.pull_request_name.trim().is_empty() {
        return Err(
            ApiError::bad_request("BAD_REQUEST", "pull_request_name cannot be empty")
                .with_request_id(request_id.clone()),
        );
    }

    let pr = NewPullRequest {
        id: parse_id(&req.pull_request_id, "pull_request_id", request_id)?,
        name: req.pull_request_name,
        author_id: parse_id(&req.author_id, "author_id", request_id)?,
    };

    let created = state
        .engine()
        .create_pull_request(pr)
        .await
        .map_err(|e| ApiError::from_review(e, request_id))?;

    Ok((
        StatusCode::CREATED,
        Json(PullRequestEnvelope {
            pr: created.into(),
        }),
    ))
}

/// POST /v1/pullRequest/merge
async fn merge_pull_request(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<MergePullRequestRequest>,
) -> Result<Json<PullRequestEnvelope>, ApiError> {
    require_admin(&state, &ctx)?;
    let request_id = &ctx.request_id;

    let id: PullRequestId = parse_id(&req.pull_request_id, "pull_request_id", request_id)?;
    let merged = state
        .engine()
        .merge_pull_request(&id)
        .await
        .map_err(|e| ApiError::from_review(e, request_id))?;

    Ok(Json(PullRequestEnvelope { pr: merged.into() }))
}

/// POST /v1/pullRequest/reassign
async fn reassign_reviewer(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<ReassignRequest>,
) -> Result<Json<ReassignResponse>, ApiError> {
    require_admin(&state, &ctx)?;
    let request_id = &ctx.request_id;

    let id: PullRequestId = parse_id(&req.pull_request_id, "pull_request_id", request_id)?;
    let old: UserId = parse_id(&req.old_user_id, "old_user_id", request_id)?;

    let reassigned = state
        .engine()
        .reassign_reviewer(&id, &old)
        .await
        .map_err(|e| ApiError::from_review(e, request_id))?;

    Ok(Json(ReassignResponse {
        pr: reassigned.pull_request.into(),
        replaced_by: reassigned.replaced_by,
    }))
}
