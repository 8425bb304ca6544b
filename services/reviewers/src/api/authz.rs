//! Admin token check for mutating routes.

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

/// Requires the configured admin token, if any.
///
/// With no token configured every caller is allowed.
pub fn require_admin(state: &AppState, ctx: &RequestContext) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token() else {
        return Ok(());
    };

    match ctx.admin_token.as_deref() {
        Some(presented) if presented == expected => Ok(()),
        Some(_) => Err(
            ApiError::unauthorized("UNAUTHORIZED", "invalid admin token")
                .with_request_id(ctx.request_id.clone()),
        ),
        None => Err(
            ApiError::unauthorized("UNAUTHORIZED", "admin token required")
                .with_request_id(ctx.request_id.clone()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::InMemoryStore;

    fn ctx(token: Option<&str>) -> RequestContext {
        RequestContext {
            request_id: "req-1".to_string(),
            admin_token: token.map(str::to_string),
        }
    }

    #[test]
    fn test_open_when_no_token_configured() {
        let state = AppState::new(Arc::new(InMemoryStore::new()), None);
        assert!(require_admin(&state, &ctx(None)).is_ok());
    }

    #[test]
    fn test_token_must_match() {
        let state = AppState::new(Arc::new(InMemoryStore::new()), Some("s3cret".to_string()));
        assert!(require_admin(&state, &ctx(Some("s3cret"))).is_ok());

        let err = require_admin(&state, &ctx(Some("wrong"))).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
        assert_eq!(err.problem.request_id, "req-1");

        assert!(require_admin(&state, &ctx(None)).is_err());
    }
}
