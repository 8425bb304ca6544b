//! Reviewer assignment engine.
//!
//! Entry points for creating, merging and reassigning pull requests, and for
//! bulk deactivation of team members. Each write path opens one unit of
//! work and commits it only after every step succeeded; any early return
//! drops the unit of work and rolls it back.

mod bulk;
mod create;
mod error;
mod membership;
mod merge;
mod pool;
mod reassign;

pub use bulk::{plan_reassignments, BulkDeactivation, ReassignmentPlan, Reassignment};
pub use error::ReviewError;
pub use pool::ReviewerPool;
pub use reassign::Reassigned;

use std::sync::Arc;

use crate::store::{Backend, MembershipStore, PullRequestStore, StatusDirectory, TransactionProvider};

/// Number of reviewers requested for a new pull request.
pub const INITIAL_REVIEWERS: usize = 2;

/// Coordinates the store contracts to implement reviewer operations.
#[derive(Clone)]
pub struct ReviewerEngine {
    statuses: Arc<dyn StatusDirectory>,
    membership: Arc<dyn MembershipStore>,
    pull_requests: Arc<dyn PullRequestStore>,
    transactions: Arc<dyn TransactionProvider>,
    pool: ReviewerPool,
}

impl ReviewerEngine {
    /// Builds an engine whose every contract is served by `backend`.
    pub fn new<B: Backend>(backend: Arc<B>) -> Self {
        let membership: Arc<dyn MembershipStore> = backend.clone();
        Self {
            statuses: backend.clone(),
            pull_requests: backend.clone(),
            transactions: backend,
            pool: ReviewerPool::new(membership.clone()),
            membership,
        }
    }
}
