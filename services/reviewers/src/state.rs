//! Application state shared across request handlers.

use std::sync::Arc;

use crate::engine::ReviewerEngine;
use crate::store::Backend;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: ReviewerEngine,
    backend: Arc<dyn Backend>,
    admin_token: Option<String>,
}

impl AppState {
    /// Create a new application state over `backend`.
    pub fn new<B: Backend>(backend: Arc<B>, admin_token: Option<String>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                engine: ReviewerEngine::new(backend.clone()),
                backend,
                admin_token,
            }),
        }
    }

    pub fn engine(&self) -> &ReviewerEngine {
        &self.inner.engine
    }

    /// Get a reference to the store backend, for health checks.
    pub fn backend(&self) -> &dyn Backend {
        self.inner.backend.as_ref()
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.inner.admin_token.as_deref()
    }
}
