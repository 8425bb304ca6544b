//! Team endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use reviewers_id::{TeamName, UserId};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;
use crate::store::{NewTeamMember, Team};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/add", post(add_team))
        .route("/get", get(get_team))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TeamMemberRequest {
    pub user_id: String,
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AddTeamRequest {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMemberRequest>,
}

#[derive(Debug, Deserialize)]
pub struct GetTeamQuery {
    pub team_name: String,
}

#[derive(Debug, Serialize)]
pub struct TeamMemberResponse {
    pub user_id: UserId,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub team_name: TeamName,
    pub members: Vec<TeamMemberResponse>,
}

impl From<Team> for TeamResponse {
    fn from(team: Team) -> Self {
        Self {
            team_name: team.name,
            members: team
                .members
                .into_iter()
                .map(|m| TeamMemberResponse {
                    user_id: m.id,
                    username: m.username,
                    is_active: m.is_active,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeamEnvelope {
    pub team: TeamResponse,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /v1/team/add
async fn add_team(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<AddTeamRequest>,
) -> Result<(StatusCode, Json<TeamEnvelope>), ApiError> {
    let request_id = &ctx.request_id;
    let name: TeamName = parse_id(&req.team_name, "team_name", request_id)?;

    let members = req
        .members
        .into_iter()
        .map(|m| -> Result<NewTeamMember, ApiError> {
            Ok(NewTeamMember {
                id: parse_id(&m.user_id, "user_id", request_id)?,
                username: m.username,
                is_active: m.is_active,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let team = state
        .engine()
        .create_team(name, members)
        .await
        .map_err(|e| ApiError::from_review(e, request_id))?;

    Ok((StatusCode::CREATED, Json(TeamEnvelope { team: team.into() })))
}

/// GET /v1/team/get?team_name=
async fn get_team(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<GetTeamQuery>,
) -> Result<Json<TeamResponse>, ApiError> {
    let request_id = &ctx.request_id;
    let name: TeamName = parse_id(&query.team_name, "team_name", request_id)?;

    let team = state
        .engine()
        .get_team(&name)
        .await
        .map_err(|e| ApiError::from_review(e, request_id))?;

    Ok(Json(team.into()))
}
