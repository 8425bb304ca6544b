//! API v1 routes.

mod pull_requests;
mod statistics;
mod teams;
mod users;

use std::str::FromStr;

use axum::Router;
use reviewers_id::IdError;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/team", teams::routes())
        .nest("/users", users::routes())
        .nest("/pullRequest", pull_requests::routes())
        .merge(statistics::routes())
}

/// Parses a caller-supplied identifier, rejecting it with 400.
fn parse_id<T>(raw: &str, field: &str, request_id: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = IdError>,
{
    raw.parse().map_err(|e: IdError| {
        ApiError::bad_request("BAD_REQUEST", format!("invalid {field}: {e}"))
            .with_request_id(request_id.to_string())
    })
}
