//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use chrono::Utc;
use rand::{SeedableRng, rngs::StdRng};

use pr_reviewer_core::{
  Error as CoreError, ErrorKind, ReviewService, lifecycle,
  pull_request::{NewPullRequest, PrStatus, PullRequest},
  store::Transactor,
  team::{NewTeam, TeamMember},
};

use crate::{SqliteStore, StoreOptions};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn service() -> ReviewService<SqliteStore> { ReviewService::new(store().await) }

fn member(id: &str, name: &str, is_active: bool) -> TeamMember {
  TeamMember { user_id: id.into(), username: name.into(), is_active }
}

fn new_pr(id: &str, author: &str) -> NewPullRequest {
  NewPullRequest {
    pull_request_id: id.into(),
    name:            format!("Change {id}"),
    author_id:       author.into(),
  }
}

async fn add_team(service: &ReviewService<SqliteStore>, name: &str, members: Vec<TeamMember>) {
  service
    .create_team(NewTeam { name: name.into(), members })
    .await
    .unwrap();
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn schema_is_versioned_and_reapplies_cleanly() {
  let s = store().await;
  let version: i64 = s
    .conn
    .call(|conn| {
      conn.execute_batch(crate::schema::SCHEMA)?;
      Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
    })
    .await
    .unwrap();
  assert_eq!(version, 1);
}

// ─── Teams and users ─────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_team() {
  let svc = service().await;
  add_team(&svc, "backend", vec![member("u2", "Bob", true), member("u1", "Alice", true)]).await;

  let team = svc.team("backend").await.unwrap();
  assert_eq!(team.name, "backend");
  assert_eq!(team.members, [member("u1", "Alice", true), member("u2", "Bob", true)]);
}

#[tokio::test]
async fn duplicate_team_is_rejected_without_touching_members() {
  let svc = service().await;
  add_team(&svc, "backend", vec![member("u1", "Alice", true)]).await;

  let err = svc
    .create_team(NewTeam { name: "backend".into(), members: vec![member("u9", "Zed", true)] })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::TeamAlreadyExists(name) if name == "backend"));

  let team = svc.team("backend").await.unwrap();
  assert_eq!(team.members.len(), 1);
  assert!(matches!(svc.set_user_active("u9", true).await, Err(CoreError::UserNotFound(_))));
}

#[tokio::test]
async fn members_move_when_listed_by_another_team() {
  let svc = service().await;
  add_team(&svc, "alpha", vec![member("u1", "Alice", true)]).await;
  add_team(&svc, "bravo", vec![member("u1", "Alice B.", false)]).await;

  assert!(svc.team("alpha").await.unwrap().members.is_empty());
  let user = svc.set_user_active("u1", true).await.unwrap();
  assert_eq!(user.team_name, "bravo");
  assert_eq!(user.username, "Alice B.");
  assert!(user.is_active);
}

// ─── Pull requests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn create_assigns_and_persists_reviewers() {
  let svc = service().await;
  add_team(&svc, "backend", vec![
    member("u1", "Alice", true),
    member("u2", "Bob", true),
    member("u3", "Carol", true),
    member("u4", "Dan", false),
  ])
  .await;

  let pr = svc.create_pull_request(new_pr("pr-1", "u1")).await.unwrap();
  assert_eq!(pr.reviewers.len(), 2);
  assert!(!pr.need_more_reviewers);
  assert!(pr.reviewers.iter().all(|r| r == "u2" || r == "u3"));

  let stored = svc.pull_request("pr-1").await.unwrap();
  assert_eq!(stored, pr);
}

#[tokio::test]
async fn create_rejects_duplicates_and_unknown_authors() {
  let svc = service().await;
  add_team(&svc, "backend", vec![member("u1", "Alice", true)]).await;
  svc.create_pull_request(new_pr("pr-1", "u1")).await.unwrap();

  let dup = svc.create_pull_request(new_pr("pr-1", "u1")).await.unwrap_err();
  assert_eq!(dup.kind(), ErrorKind::AlreadyExists);

  let ghost = svc.create_pull_request(new_pr("pr-2", "ghost")).await.unwrap_err();
  assert!(matches!(ghost, CoreError::UserNotFound(id) if id == "ghost"));
}

#[tokio::test]
async fn author_row_cannot_be_inserted_as_reviewer() {
  let s = store().await;
  let err = s
    .transaction("seed", |uow| {
      let team = uow.insert_team("backend")?;
      uow.upsert_members(team.team_id, &[member("u1", "Alice", true)])?;
      uow.insert_pull_request(&PullRequest::open(new_pr("pr-1", "u1"), Utc::now()))?;
      uow.assign_reviewers("pr-1", &["u1".to_owned()])
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Internal);

  // The whole unit of work rolled back.
  let team = s.read("check", |uow| uow.team_by_name("backend")).await.unwrap();
  assert!(team.is_none());
}

#[tokio::test]
async fn merge_is_idempotent() {
  let svc = service().await;
  add_team(&svc, "backend", vec![member("u1", "Alice", true), member("u2", "Bob", true)]).await;
  svc.create_pull_request(new_pr("pr-1", "u1")).await.unwrap();

  let first = svc.merge_pull_request("pr-1").await.unwrap();
  assert_eq!(first.status, PrStatus::Merged);
  assert!(!first.need_more_reviewers);
  assert_eq!(first.reviewers, ["u2"]);

  let second = svc.merge_pull_request("pr-1").await.unwrap();
  assert_eq!(second, first);

  let missing = svc.merge_pull_request("pr-404").await.unwrap_err();
  assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn reassign_replaces_the_slot() {
  let svc = service().await;
  add_team(&svc, "backend", vec![
    member("u1", "Alice", true),
    member("u2", "Bob", true),
    member("u3", "Carol", true),
    member("u4", "Dan", true),
  ])
  .await;
  let created = svc.create_pull_request(new_pr("pr-1", "u1")).await.unwrap();
  let old = &created.reviewers[0];

  let result = svc.reassign_reviewer("pr-1", old).await.unwrap();
  assert!(!result.pull_request.has_reviewer(old));
  assert!(result.pull_request.has_reviewer(&result.replaced_by));
  assert!(!created.reviewers.contains(&result.replaced_by));
  assert_ne!(result.replaced_by, "u1");

  let stored = svc.pull_request("pr-1").await.unwrap();
  assert_eq!(stored.reviewers, result.pull_request.reviewers);
}

#[tokio::test]
async fn reassign_failures_leave_reviewers_unchanged() {
  let svc = service().await;
  add_team(&svc, "backend", vec![
    member("u1", "Alice", true),
    member("u2", "Bob", true),
    member("u3", "Carol", true),
  ])
  .await;
  let created = svc.create_pull_request(new_pr("pr-1", "u1")).await.unwrap();

  let no_candidate = svc.reassign_reviewer("pr-1", "u2").await.unwrap_err();
  assert_eq!(no_candidate.kind(), ErrorKind::NoCandidate);

  let not_assigned = svc.reassign_reviewer("pr-1", "u1").await.unwrap_err();
  assert_eq!(not_assigned.kind(), ErrorKind::ReviewerNotAssigned);

  svc.merge_pull_request("pr-1").await.unwrap();
  let merged = svc.reassign_reviewer("pr-1", "u2").await.unwrap_err();
  assert_eq!(merged.kind(), ErrorKind::PrMerged);

  let stored = svc.pull_request("pr-1").await.unwrap();
  assert_eq!(stored.reviewers, created.reviewers);
}

#[tokio::test]
async fn seeded_selection_is_reproducible() {
  let s = store().await;
  s.transaction("seed", |uow| {
    let team = uow.insert_team("backend")?;
    uow.upsert_members(team.team_id, &[
      member("u1", "Alice", true),
      member("u2", "Bob", true),
      member("u3", "Carol", true),
      member("u4", "Dan", true),
      member("u5", "Eve", true),
    ])
  })
  .await
  .unwrap();

  let mut picks = Vec::new();
  for id in ["pr-a", "pr-b"] {
    let pr = s
      .read("dry-run", move |uow| {
        lifecycle::create(uow, &mut StdRng::seed_from_u64(99), new_pr(id, "u1"), Utc::now())
      })
      .await
      .unwrap();
    picks.push(pr.reviewers);
  }
  assert_eq!(picks[0], picks[1]);

  // Reads never commit.
  let stored = s.read("check", |uow| uow.pull_request("pr-a")).await.unwrap();
  assert!(stored.is_none());
}

// ─── Reporting ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn stats_and_assignments() {
  let svc = service().await;
  add_team(&svc, "backend", vec![member("u1", "Alice", true), member("u3", "Carol", true)]).await;
  add_team(&svc, "frontend", vec![member("u2", "Bob", true)]).await;

  for id in ["pr-1", "pr-2", "pr-3"] {
    svc.create_pull_request(new_pr(id, "u1")).await.unwrap();
  }
  svc.merge_pull_request("pr-1").await.unwrap();

  let stats = svc.stats().await.unwrap();
  let rows: Vec<_> = stats
    .iter()
    .map(|s| (s.username.as_str(), s.open_reviews, s.merged_reviews))
    .collect();
  assert_eq!(rows, [("Alice", 0, 0), ("Bob", 0, 0), ("Carol", 2, 1)]);

  let assignments = svc.review_assignments("u3").await.unwrap();
  let ids: Vec<_> = assignments
    .pull_requests
    .iter()
    .map(|p| p.pull_request_id.as_str())
    .collect();
  assert_eq!(ids, ["pr-3", "pr-2", "pr-1"]);
  assert_eq!(assignments.pull_requests[2].status, PrStatus::Merged);
}

// ─── Cascade ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deactivating_reviewers_team_without_spares() {
  let svc = service().await;
  add_team(&svc, "dev", vec![member("a", "Author", true)]).await;
  add_team(&svc, "qa", vec![member("q1", "Quinn", true), member("q2", "Quincy", true)]).await;
  svc
    .store()
    .transaction("seed", |uow| {
      uow.insert_pull_request(&PullRequest::open(new_pr("pr-1", "a"), Utc::now()))?;
      uow.assign_reviewers("pr-1", &["q1".to_owned(), "q2".to_owned()])
    })
    .await
    .unwrap();

  let report = svc.deactivate_team("qa").await.unwrap();
  assert_eq!(report.deactivated_users, 2);
  assert_eq!(report.reassigned_pull_requests, 1);

  let qa = svc.team("qa").await.unwrap();
  assert!(qa.members.iter().all(|m| !m.is_active));

  let missing = svc.deactivate_team("ops").await.unwrap_err();
  assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn cascade_locked_read_returns_only_open_pull_requests() {
  let s = store().await;
  let affected = s
    .transaction("seed", |uow| {
      let team = uow.insert_team("backend")?;
      uow.upsert_members(team.team_id, &[
        member("a", "Author", true),
        member("r1", "Rita", true),
        member("r2", "Ravi", true),
      ])?;
      for id in ["pr-1", "pr-2", "pr-3"] {
        uow.insert_pull_request(&PullRequest::open(new_pr(id, "a"), Utc::now()))?;
      }
      uow.assign_reviewers("pr-1", &["r1".to_owned(), "r2".to_owned()])?;
      uow.assign_reviewers("pr-2", &["r1".to_owned()])?;
      uow.assign_reviewers("pr-3", &["r2".to_owned()])?;
      uow.mark_merged("pr-2", Utc::now())?;

      uow.lock_open_pull_requests_reviewed_by(&["r1".to_owned()])
    })
    .await
    .unwrap();

  assert_eq!(affected.len(), 1);
  assert_eq!(affected[0].pull_request_id, "pr-1");
  assert_eq!(affected[0].reviewers, ["r1", "r2"]);
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

/// Two services on one database file, each with its own connection thread.
async fn two_connections()
-> (tempfile::TempDir, ReviewService<SqliteStore>, ReviewService<SqliteStore>) {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("reviews.db");
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();
  (dir, ReviewService::new(a), ReviewService::new(b))
}

async fn add_numbered_team(service: &ReviewService<SqliteStore>, size: usize) {
  let members = (1..=size)
    .map(|i| member(&format!("u{i}"), &format!("User {i}"), true))
    .collect();
  add_team(service, "backend", members).await;
}

#[tokio::test]
async fn concurrent_reassigns_on_one_pull_request_run_one_after_the_other() {
  let (_dir, a, b) = two_connections().await;
  add_numbered_team(&a, 7).await;

  for n in 0..30 {
    let id = format!("pr-{n}");
    let created = a.create_pull_request(new_pr(&id, "u1")).await.unwrap();
    let (r0, r1) = (&created.reviewers[0], &created.reviewers[1]);

    let (first, second) =
      tokio::join!(a.reassign_reviewer(&id, r0), b.reassign_reviewer(&id, r1));
    let (first, second) = (first.unwrap(), second.unwrap());

    let stored = a.pull_request(&id).await.unwrap();
    assert_eq!(stored.reviewers.len(), 2, "{id}: {:?}", stored.reviewers);
    assert_ne!(stored.reviewers[0], stored.reviewers[1], "{id}");
    assert!(!stored.has_reviewer("u1"));
    assert!(stored.has_reviewer(&first.replaced_by));
    assert!(stored.has_reviewer(&second.replaced_by));
  }
}

#[tokio::test]
async fn reassign_racing_merge_sees_a_consistent_pull_request() {
  let (_dir, a, b) = two_connections().await;
  add_numbered_team(&a, 5).await;

  for n in 0..30 {
    let id = format!("pr-{n}");
    let created = a.create_pull_request(new_pr(&id, "u1")).await.unwrap();
    let old = &created.reviewers[0];

    let (merged, reassigned) =
      tokio::join!(a.merge_pull_request(&id), b.reassign_reviewer(&id, old));
    let merged = merged.unwrap();
    assert_eq!(merged.status, PrStatus::Merged);

    let stored = a.pull_request(&id).await.unwrap();
    assert_eq!(stored.reviewers.len(), 2);
    assert_eq!(merged.reviewers, stored.reviewers);
    match reassigned {
      Ok(result) => {
        assert!(!stored.has_reviewer(old));
        assert!(stored.has_reviewer(&result.replaced_by));
      }
      Err(e) => {
        assert_eq!(e.kind(), ErrorKind::PrMerged);
        assert_eq!(stored.reviewers, created.reviewers);
      }
    }

    let late = b.reassign_reviewer(&id, &stored.reviewers[0]).await.unwrap_err();
    assert_eq!(late.kind(), ErrorKind::PrMerged);
  }
}

// ─── Cancellation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn deadline_cancels_and_rolls_back() {
  let s = SqliteStore::open_with(":memory:", StoreOptions {
    busy_timeout:      Duration::from_secs(1),
    operation_timeout: Some(Duration::from_millis(20)),
  })
  .await
  .unwrap();

  let err = s
    .transaction("slow", |uow| {
      uow.insert_team("slowpokes")?;
      std::thread::sleep(Duration::from_millis(200));
      Ok(())
    })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Cancelled));

  let patient = SqliteStore { operation_timeout: None, ..s.clone() };
  let team = patient
    .read("check", |uow| uow.team_by_name("slowpokes"))
    .await
    .unwrap();
  assert!(team.is_none());
}

#[tokio::test]
async fn dropped_operation_never_commits() {
  let s = store().await;
  let started = std::sync::Arc::new(std::sync::Barrier::new(2));

  let gate = started.clone();
  let op = s.transaction("dropped", move |uow| {
    gate.wait();
    uow.insert_team("ghosts")?;
    std::thread::sleep(Duration::from_millis(100));
    Ok(())
  });

  // Poll the operation until the unit of work is running, then drop it.
  tokio::select! {
    _ = op => panic!("operation finished before being dropped"),
    _ = tokio::task::spawn_blocking(move || started.wait()) => {}
  }

  let team = s.read("check", |uow| uow.team_by_name("ghosts")).await.unwrap();
  assert!(team.is_none());
}
