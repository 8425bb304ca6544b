//! Engine flow tests against the in-memory store.
//!
//! Covers reviewer selection, merge idempotence, single reassignment and
//! bulk deactivation, including rollback and concurrent-removal cases.

use std::collections::BTreeSet;
use std::sync::Arc;

use reviewers_id::{PullRequestId, TeamName, UserId};
use reviewers_service::engine::{ReviewError, ReviewerEngine};
use reviewers_service::store::{
    InMemoryStore, MembershipStore, NewPullRequest, NewTeamMember, PullRequestReassignment,
    PullRequestStatus, PullRequestStore, TransactionProvider,
};
use rstest::{fixture, rstest};

fn uid(s: &str) -> UserId {
    s.parse().unwrap()
}

fn prid(s: &str) -> PullRequestId {
    s.parse().unwrap()
}

fn team(s: &str) -> TeamName {
    s.parse().unwrap()
}

struct Harness {
    store: Arc<InMemoryStore>,
    engine: ReviewerEngine,
}

impl Harness {
    async fn with_team(&self, name: &str, members: &[(&str, bool)]) {
        let members = members
            .iter()
            .map(|(id, is_active)| NewTeamMember {
                id: uid(id),
                username: format!("{id} name"),
                is_active: *is_active,
            })
            .collect();
        self.engine.create_team(team(name), members).await.unwrap();
    }

    async fn create(&self, id: &str, author: &str) -> Result<Vec<UserId>, ReviewError> {
        let pr = self
            .engine
            .create_pull_request(NewPullRequest {
                id: prid(id),
                name: format!("{id} title"),
                author_id: uid(author),
            })
            .await?;
        Ok(pr.reviewers)
    }

    async fn reviewers(&self, id: &str) -> Vec<UserId> {
        self.store.get_reviewers(&prid(id)).await.unwrap()
    }

    async fn is_active(&self, id: &str) -> bool {
        self.store.get_user(&uid(id)).await.unwrap().is_active
    }

    async fn activate(&self, id: &str) {
        self.engine.set_user_active(&uid(id), true).await.unwrap();
    }
}

#[fixture]
fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let engine = ReviewerEngine::new(store.clone());
    Harness { store, engine }
}

// =============================================================================
// Create
// =============================================================================

#[rstest]
#[tokio::test]
async fn create_assigns_two_active_teammates(harness: Harness) {
    harness
        .with_team(
            "T",
            &[("author", true), ("r1", true), ("r2", true), ("r3", true)],
        )
        .await;

    let reviewers = harness.create("p1", "author").await.unwrap();

    assert_eq!(reviewers.len(), 2);
    assert!(!reviewers.contains(&uid("author")));
    let pool: BTreeSet<UserId> = ["r1", "r2", "r3"].into_iter().map(uid).collect();
    assert!(reviewers.iter().all(|r| pool.contains(r)));
    assert_eq!(harness.reviewers("p1").await, reviewers);

    let pr = harness.store.get_pull_request(&prid("p1")).await.unwrap();
    assert_eq!(pr.status.kind, PullRequestStatus::Open);
    assert!(pr.merged_at.is_none());
}

#[rstest]
#[tokio::test]
async fn create_skips_inactive_and_other_teams(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", false), ("r2", true)])
        .await;
    harness.with_team("U", &[("x1", true), ("x2", true)]).await;

    let reviewers = harness.create("p1", "author").await.unwrap();

    assert_eq!(reviewers, vec![uid("r2")]);
}

#[rstest]
#[tokio::test]
async fn create_without_candidates_fails_and_writes_nothing(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", false)])
        .await;

    let err = harness.create("p1", "author").await.unwrap_err();

    assert!(matches!(&err, ReviewError::NotFound(m) if m == "no available reviewers found"));
    assert!(!harness.store.pull_request_exists(&prid("p1")).await.unwrap());
}

#[rstest]
#[tokio::test]
async fn create_with_unknown_author_fails(harness: Harness) {
    let err = harness.create("p1", "ghost").await.unwrap_err();
    assert!(matches!(&err, ReviewError::NotFound(m) if m == "author not found"));
}

#[rstest]
#[tokio::test]
async fn duplicate_create_is_rejected_without_new_reviewer_rows(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", true), ("r2", true)])
        .await;
    harness
        .with_team("U", &[("other", true), ("x1", true), ("x2", true)])
        .await;
    let first = harness.create("p1", "author").await.unwrap();

    let err = harness.create("p1", "other").await.unwrap_err();

    assert!(matches!(err, ReviewError::AlreadyExists(ref id) if id == "p1"));
    assert_eq!(harness.reviewers("p1").await, first);
    let stats = harness.engine.statistics().await.unwrap();
    assert!(stats
        .by_user
        .iter()
        .all(|s| s.user_id != uid("x1") && s.user_id != uid("x2")));
}

// =============================================================================
// Merge
// =============================================================================

#[rstest]
#[tokio::test]
async fn merge_is_idempotent_on_merged_at(harness: Harness) {
    harness.with_team("T", &[("author", true), ("r1", true)]).await;
    harness.create("p1", "author").await.unwrap();

    let first = harness.engine.merge_pull_request(&prid("p1")).await.unwrap();
    let merged_at = first.merged_at.expect("merged_at set on first merge");
    assert_eq!(first.status.kind, PullRequestStatus::Merged);
    assert_eq!(first.reviewers, vec![uid("r1")]);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = harness.engine.merge_pull_request(&prid("p1")).await.unwrap();

    assert_eq!(second.merged_at, Some(merged_at));
    assert_eq!(second.status.kind, PullRequestStatus::Merged);
}

#[rstest]
#[tokio::test]
async fn merge_unknown_pull_request_fails(harness: Harness) {
    let err = harness
        .engine
        .merge_pull_request(&prid("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::NotFound(_)));
}

// =============================================================================
// Reassign
// =============================================================================

#[rstest]
#[tokio::test]
async fn reassign_swaps_to_remaining_teammate(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", true), ("r2", false)])
        .await;
    harness.create("p1", "author").await.unwrap();
    harness.activate("r2").await;

    let reassigned = harness
        .engine
        .reassign_reviewer(&prid("p1"), &uid("r1"))
        .await
        .unwrap();

    assert_eq!(reassigned.replaced_by, uid("r2"));
    assert_eq!(reassigned.pull_request.reviewers, vec![uid("r2")]);
    assert_eq!(harness.reviewers("p1").await, vec![uid("r2")]);
}

#[rstest]
#[tokio::test]
async fn reassign_never_picks_author_old_or_current_reviewers(harness: Harness) {
    harness
        .with_team(
            "T",
            &[
                ("author", true),
                ("r1", true),
                ("r2", true),
                ("r3", true),
                ("r4", true),
            ],
        )
        .await;
    let before = harness.create("p1", "author").await.unwrap();
    let old = before[0].clone();

    let reassigned = harness
        .engine
        .reassign_reviewer(&prid("p1"), &old)
        .await
        .unwrap();

    let new = reassigned.replaced_by;
    assert_ne!(new, uid("author"));
    assert!(!before.contains(&new));
    let after = harness.reviewers("p1").await;
    assert!(!after.contains(&old));
    assert!(after.contains(&new));
    assert_eq!(after.len(), before.len());
}

#[rstest]
#[tokio::test]
async fn reassign_without_candidate_fails(harness: Harness) {
    harness.with_team("T", &[("author", true), ("r1", true)]).await;
    harness.create("p1", "author").await.unwrap();

    let err = harness
        .engine
        .reassign_reviewer(&prid("p1"), &uid("r1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::NoCandidate(_)));
    assert_eq!(harness.reviewers("p1").await, vec![uid("r1")]);
}

#[rstest]
#[tokio::test]
async fn reassign_of_non_reviewer_fails_unchanged(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", true), ("r2", false)])
        .await;
    harness.create("p1", "author").await.unwrap();
    harness.activate("r2").await;

    let err = harness
        .engine
        .reassign_reviewer(&prid("p1"), &uid("r2"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::NotAssigned { .. }));
    assert_eq!(harness.reviewers("p1").await, vec![uid("r1")]);
}

#[rstest]
#[tokio::test]
async fn reassign_on_merged_pull_request_fails_unchanged(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", true), ("r2", false)])
        .await;
    harness.create("p1", "author").await.unwrap();
    harness.activate("r2").await;
    harness.engine.merge_pull_request(&prid("p1")).await.unwrap();

    let err = harness
        .engine
        .reassign_reviewer(&prid("p1"), &uid("r1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::PrMerged(_)));
    assert_eq!(harness.reviewers("p1").await, vec![uid("r1")]);
}

#[rstest]
#[tokio::test]
async fn reassign_unknown_reviewer_fails(harness: Harness) {
    harness.with_team("T", &[("author", true), ("r1", true)]).await;
    harness.create("p1", "author").await.unwrap();

    let err = harness
        .engine
        .reassign_reviewer(&prid("p1"), &uid("ghost"))
        .await
        .unwrap_err();

    assert!(matches!(&err, ReviewError::NotFound(m) if m == "reviewer not found"));
}

#[rstest]
#[tokio::test]
async fn reassign_detects_concurrent_removal(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", true), ("r2", false)])
        .await;
    harness.create("p1", "author").await.unwrap();
    harness.activate("r2").await;
    harness
        .store
        .remove_reviewer_before_next_transaction(prid("p1"), uid("r1"))
        .await;

    let err = harness
        .engine
        .reassign_reviewer(&prid("p1"), &uid("r1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::NotAssigned { .. }));
    assert!(harness.reviewers("p1").await.is_empty());
}

// =============================================================================
// Bulk deactivation
// =============================================================================

#[rstest]
#[tokio::test]
async fn bulk_flips_only_active_team_members(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", true), ("r2", false)])
        .await;
    harness.with_team("U", &[("x1", true)]).await;

    let result = harness
        .engine
        .deactivate_team_users(&team("T"), &[uid("r1"), uid("r2"), uid("x1"), uid("ghost")])
        .await
        .unwrap();

    assert_eq!(result.deactivated_user_ids, vec![uid("r1")]);
    assert!(!harness.is_active("r1").await);
    assert!(!harness.is_active("r2").await);
    assert!(harness.is_active("x1").await);
    assert!(harness.is_active("author").await);
}

#[rstest]
#[tokio::test]
async fn bulk_with_single_spare_fills_one_slot(harness: Harness) {
    harness
        .with_team(
            "T",
            &[("author", true), ("r1", true), ("r2", true), ("r3", false)],
        )
        .await;
    assert_eq!(
        harness.create("p1", "author").await.unwrap(),
        vec![uid("r1"), uid("r2")]
    );
    harness.activate("r3").await;

    let result = harness
        .engine
        .deactivate_team_users(&team("T"), &[uid("r1"), uid("r2")])
        .await
        .unwrap();

    assert_eq!(result.deactivated_user_ids, vec![uid("r1"), uid("r2")]);
    assert_eq!(result.reassignments.len(), 1);
    let swap = &result.reassignments[0];
    assert_eq!(swap.pull_request_id, prid("p1"));
    assert_eq!(swap.new_reviewer_id, uid("r3"));
    assert!(swap.old_reviewer_id == uid("r1") || swap.old_reviewer_id == uid("r2"));
    assert_eq!(harness.reviewers("p1").await, vec![uid("r3")]);
}

#[rstest]
#[tokio::test]
async fn bulk_does_not_draw_users_being_deactivated(harness: Harness) {
    harness
        .with_team(
            "T",
            &[("author", true), ("r1", true), ("r2", false), ("r3", false)],
        )
        .await;
    harness.create("p1", "author").await.unwrap();
    harness.activate("r2").await;
    harness.activate("r3").await;

    let result = harness
        .engine
        .deactivate_team_users(&team("T"), &[uid("r1"), uid("r2")])
        .await
        .unwrap();

    assert_eq!(result.reassignments.len(), 1);
    assert_eq!(result.reassignments[0].new_reviewer_id, uid("r3"));
    assert_eq!(harness.reviewers("p1").await, vec![uid("r3")]);
}

#[rstest]
#[tokio::test]
async fn bulk_leaves_merged_pull_requests_alone(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", true), ("r2", false)])
        .await;
    harness.create("p1", "author").await.unwrap();
    harness.engine.merge_pull_request(&prid("p1")).await.unwrap();
    harness.activate("r2").await;

    let result = harness
        .engine
        .deactivate_team_users(&team("T"), &[uid("r1")])
        .await
        .unwrap();

    assert_eq!(result.deactivated_user_ids, vec![uid("r1")]);
    assert!(result.reassignments.is_empty());
    assert_eq!(harness.reviewers("p1").await, vec![uid("r1")]);
}

#[rstest]
#[case::nothing_requested(&[])]
#[case::only_inactive(&["r2"])]
#[case::only_outsiders(&["x1"])]
#[tokio::test]
async fn bulk_without_valid_targets_is_a_no_op(harness: Harness, #[case] requested: &[&str]) {
    harness
        .with_team("T", &[("author", true), ("r1", true), ("r2", false)])
        .await;
    harness.with_team("U", &[("x1", true)]).await;
    harness.create("p1", "author").await.unwrap();

    let ids: Vec<UserId> = requested.iter().map(|s| uid(s)).collect();
    let result = harness
        .engine
        .deactivate_team_users(&team("T"), &ids)
        .await
        .unwrap();

    assert!(result.deactivated_user_ids.is_empty());
    assert!(result.reassignments.is_empty());
    assert!(harness.is_active("r1").await);
    assert!(harness.is_active("x1").await);
    assert_eq!(harness.reviewers("p1").await, vec![uid("r1")]);
}

#[rstest]
#[tokio::test]
async fn bulk_on_unknown_team_fails(harness: Harness) {
    let err = harness
        .engine
        .deactivate_team_users(&team("nope"), &[uid("r1")])
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::NotFound(_)));
}

#[rstest]
#[tokio::test]
async fn bulk_failure_rolls_back_everything(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", true), ("r2", false)])
        .await;
    harness.create("p1", "author").await.unwrap();
    harness.activate("r2").await;
    harness.store.fail_next_bulk_reassign().await;

    let err = harness
        .engine
        .deactivate_team_users(&team("T"), &[uid("r1")])
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::Internal { .. }));
    assert!(harness.is_active("r1").await);
    assert_eq!(harness.reviewers("p1").await, vec![uid("r1")]);
}

#[rstest]
#[tokio::test]
async fn bulk_reassign_collapses_duplicate_new_reviewers(harness: Harness) {
    harness
        .with_team(
            "T",
            &[("author", true), ("r1", true), ("r2", true), ("r3", false)],
        )
        .await;
    harness.create("p1", "author").await.unwrap();

    let mut tx = harness.store.begin().await.unwrap();
    tx.bulk_reassign(&[PullRequestReassignment {
        pull_request_id: prid("p1"),
        replacements: [(uid("r1"), uid("r3")), (uid("r2"), uid("r3"))]
            .into_iter()
            .collect(),
    }])
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(harness.reviewers("p1").await, vec![uid("r3")]);
}

// =============================================================================
// Teams, users, statistics
// =============================================================================

#[rstest]
#[tokio::test]
async fn create_team_twice_fails(harness: Harness) {
    harness.with_team("T", &[("author", true)]).await;

    let err = harness
        .engine
        .create_team(team("T"), Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::TeamExists(_)));
}

#[rstest]
#[tokio::test]
async fn create_team_moves_existing_users(harness: Harness) {
    harness.with_team("T", &[("author", true), ("r1", true)]).await;
    harness.with_team("U", &[("r1", false)]).await;

    let t = harness.engine.get_team(&team("T")).await.unwrap();
    let u = harness.engine.get_team(&team("U")).await.unwrap();

    assert_eq!(t.members.len(), 1);
    assert_eq!(u.members[0].id, uid("r1"));
    assert!(!u.members[0].is_active);
}

#[rstest]
#[tokio::test]
async fn get_unknown_team_fails(harness: Harness) {
    let err = harness.engine.get_team(&team("nope")).await.unwrap_err();
    assert!(matches!(err, ReviewError::NotFound(_)));
}

#[rstest]
#[tokio::test]
async fn set_user_active_does_not_touch_assignments(harness: Harness) {
    harness.with_team("T", &[("author", true), ("r1", true)]).await;
    harness.create("p1", "author").await.unwrap();

    let user = harness
        .engine
        .set_user_active(&uid("r1"), false)
        .await
        .unwrap();

    assert!(!user.is_active);
    assert_eq!(harness.reviewers("p1").await, vec![uid("r1")]);

    let err = harness
        .engine
        .set_user_active(&uid("ghost"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::NotFound(_)));
}

#[rstest]
#[tokio::test]
async fn user_reviews_list_assigned_pull_requests(harness: Harness) {
    harness.with_team("T", &[("author", true), ("r1", true)]).await;
    harness.create("p2", "author").await.unwrap();
    harness.create("p1", "author").await.unwrap();
    harness.engine.merge_pull_request(&prid("p2")).await.unwrap();

    let reviews = harness.engine.get_user_reviews(&uid("r1")).await.unwrap();

    let ids: Vec<_> = reviews.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![prid("p1"), prid("p2")]);
    assert_eq!(reviews[1].status, PullRequestStatus::Merged);
    assert!(harness
        .engine
        .get_user_reviews(&uid("author"))
        .await
        .unwrap()
        .is_empty());
}

#[rstest]
#[tokio::test]
async fn statistics_are_ordered_by_count(harness: Harness) {
    harness
        .with_team("T", &[("author", true), ("r1", true), ("r2", true)])
        .await;
    harness.with_team("U", &[("other", true), ("r3", true)]).await;
    harness.create("p1", "author").await.unwrap();
    harness.create("p2", "author").await.unwrap();
    harness.create("p3", "other").await.unwrap();

    let stats = harness.engine.statistics().await.unwrap();

    let by_user: Vec<(UserId, i64)> = stats
        .by_user
        .iter()
        .map(|s| (s.user_id.clone(), s.count))
        .collect();
    assert_eq!(
        by_user,
        vec![(uid("r1"), 2), (uid("r2"), 2), (uid("r3"), 1)]
    );
    assert_eq!(stats.by_pull_request[0].count, 2);
    assert_eq!(stats.by_pull_request.last().unwrap().pull_request_id, prid("p3"));
}
