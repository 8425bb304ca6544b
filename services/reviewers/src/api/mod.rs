//! HTTP API handlers and routing.

mod authz;
pub mod error;
mod health;
mod request_context;
mod v1;

use std::time::Duration;

use axum::{
    http::{header, HeaderName, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::state::AppState;

pub use request_context::{ADMIN_TOKEN_HEADER, REQUEST_ID_HEADER};

/// Create the main API router with all routes and middleware.
///
/// A request that exceeds `request_timeout` is answered with 408 and its
/// handler future is dropped, which rolls back any open unit of work.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(ADMIN_TOKEN_HEADER),
        ])
        .allow_origin(Any);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        // Health endpoints (no auth required)
        .merge(health::routes())
        // API v1 routes
        .nest("/v1", v1::routes())
        // Middleware, innermost first
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors)
        // Application state
        .with_state(state)
}
