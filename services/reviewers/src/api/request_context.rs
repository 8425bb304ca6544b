//! Request-scoped context extracted from HTTP requests.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::api::error::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub admin_token: Option<String>,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // The request-id layer always sets this header ahead of handlers.
        let request_id = header_string(&parts.headers, REQUEST_ID_HEADER)
            .unwrap_or_else(|| "unknown".to_string());

        let admin_token = header_string(&parts.headers, ADMIN_TOKEN_HEADER)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        Ok(Self {
            request_id,
            admin_token,
        })
    }
}
