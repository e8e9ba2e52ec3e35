//! [`ReviewService`]: the operations exposed to transports.
//!
//! Every mutating operation is one unit of work inside a single
//! [`Transactor::transaction`]; lookups go through [`Transactor::read`].

use chrono::{DateTime, SubsecRound, Utc};
use tracing::info;

use crate::{
  Error, Result, cascade,
  cascade::DeactivationReport,
  lifecycle,
  pull_request::{NewPullRequest, PullRequest, Reassignment, ReviewAssignments, ReviewerStats},
  store::Transactor,
  team::{NewTeam, TeamWithMembers, UserWithTeam},
};

/// Current time truncated to microseconds, the resolution backends persist.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

#[derive(Debug, Clone)]
pub struct ReviewService<D> {
  db: D,
}

impl<D: Transactor> ReviewService<D> {
  pub fn new(db: D) -> Self { Self { db } }

  pub fn store(&self) -> &D { &self.db }

  // ─── Teams and users ─────────────────────────────────────────────────────

  /// Create a team and upsert its members. Returns the submitted members.
  pub async fn create_team(&self, new: NewTeam) -> Result<TeamWithMembers> {
    let team = self
      .db
      .transaction("create_team", move |uow| {
        let team = uow.insert_team(&new.name)?;
        uow.upsert_members(team.team_id, &new.members)?;
        Ok(TeamWithMembers { team_id: team.team_id, name: team.name, members: new.members })
      })
      .await?;

    info!(team_name = %team.name, members = team.members.len(), "team created");
    Ok(team)
  }

  pub async fn team(&self, name: &str) -> Result<TeamWithMembers> {
    let name = name.to_owned();
    self
      .db
      .read("get_team", move |uow| {
        let team = uow
          .team_by_name(&name)?
          .ok_or_else(|| Error::TeamNotFound(name.clone()))?;
        let members = uow.team_members(team.team_id)?;
        Ok(TeamWithMembers { team_id: team.team_id, name: team.name, members })
      })
      .await
  }

  pub async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<UserWithTeam> {
    let id = user_id.to_owned();
    let user = self
      .db
      .transaction("set_user_active", move |uow| {
        uow
          .set_user_active(&id, is_active)?
          .ok_or_else(|| Error::UserNotFound(id.clone()))
      })
      .await?;

    info!(user_id, is_active, "user activity updated");
    Ok(user)
  }

  /// Deactivate a team and replace its members on open pull requests.
  pub async fn deactivate_team(&self, team_name: &str) -> Result<DeactivationReport> {
    let name = team_name.to_owned();
    let report = self
      .db
      .transaction("deactivate_team", move |uow| {
        cascade::deactivate_team(uow, &mut rand::thread_rng(), &name)
      })
      .await?;

    info!(
      team_name,
      deactivated = report.deactivated_users,
      reassigned = report.reassigned_pull_requests,
      "team deactivated"
    );
    Ok(report)
  }

  // ─── Pull requests ───────────────────────────────────────────────────────

  pub async fn create_pull_request(&self, new: NewPullRequest) -> Result<PullRequest> {
    let pr = self
      .db
      .transaction("create_pull_request", move |uow| {
        lifecycle::create(uow, &mut rand::thread_rng(), new, now())
      })
      .await?;

    info!(
      pr_id = %pr.pull_request_id,
      reviewers = ?pr.reviewers,
      need_more_reviewers = pr.need_more_reviewers,
      "pull request created"
    );
    Ok(pr)
  }

  pub async fn merge_pull_request(&self, pull_request_id: &str) -> Result<PullRequest> {
    let id = pull_request_id.to_owned();
    let pr = self
      .db
      .transaction("merge_pull_request", move |uow| lifecycle::merge(uow, &id, now()))
      .await?;

    info!(pr_id = pull_request_id, "pull request merged");
    Ok(pr)
  }

  pub async fn reassign_reviewer(
    &self,
    pull_request_id: &str,
    old_reviewer_id: &str,
  ) -> Result<Reassignment> {
    let (id, old) = (pull_request_id.to_owned(), old_reviewer_id.to_owned());
    let result = self
      .db
      .transaction("reassign_reviewer", move |uow| {
        lifecycle::reassign(uow, &mut rand::thread_rng(), &id, &old)
      })
      .await?;

    info!(
      pr_id = pull_request_id,
      old_reviewer_id,
      new_reviewer_id = %result.replaced_by,
      "reviewer reassigned"
    );
    Ok(result)
  }

  pub async fn pull_request(&self, pull_request_id: &str) -> Result<PullRequest> {
    let id = pull_request_id.to_owned();
    self
      .db
      .read("get_pull_request", move |uow| {
        uow
          .pull_request(&id)?
          .ok_or_else(|| Error::PullRequestNotFound(id.clone()))
      })
      .await
  }

  // ─── Reporting ───────────────────────────────────────────────────────────

  /// Pull requests `user_id` reviews, newest first. An unknown user simply
  /// has no assignments.
  pub async fn review_assignments(&self, user_id: &str) -> Result<ReviewAssignments> {
    let id = user_id.to_owned();
    let pull_requests = self
      .db
      .read("review_assignments", move |uow| uow.review_assignments(&id))
      .await?;
    Ok(ReviewAssignments { user_id: user_id.to_owned(), pull_requests })
  }

  pub async fn stats(&self) -> Result<Vec<ReviewerStats>> {
    self.db.read("stats", |uow| uow.reviewer_stats()).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ErrorKind, memory::MemoryStore, pull_request::PrStatus, team::TeamMember};

  fn member(id: &str, name: &str, is_active: bool) -> TeamMember {
    TeamMember { user_id: id.into(), username: name.into(), is_active }
  }

  fn new_pr(id: &str, author: &str) -> NewPullRequest {
    NewPullRequest {
      pull_request_id: id.into(),
      name:            format!("Feature {id}"),
      author_id:       author.into(),
    }
  }

  async fn service_with(team: &str, members: Vec<TeamMember>) -> ReviewService<MemoryStore> {
    let service = ReviewService::new(MemoryStore::default());
    service
      .create_team(NewTeam { name: team.into(), members })
      .await
      .unwrap();
    service
  }

  #[tokio::test]
  async fn create_team_returns_submitted_members_and_rejects_duplicates() {
    let members = vec![member("u2", "Bob", true), member("u1", "Alice", false)];
    let service = ReviewService::new(MemoryStore::default());

    let created = service
      .create_team(NewTeam { name: "backend".into(), members: members.clone() })
      .await
      .unwrap();
    assert_eq!(created.name, "backend");
    assert_eq!(created.members, members);

    let err = service
      .create_team(NewTeam { name: "backend".into(), members: vec![] })
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let fetched = service.team("backend").await.unwrap();
    assert_eq!(fetched.members, [member("u1", "Alice", false), member("u2", "Bob", true)]);
  }

  #[tokio::test]
  async fn unknown_team_is_not_found() {
    let service = ReviewService::new(MemoryStore::default());
    let err = service.team("nobody").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
  }

  #[tokio::test]
  async fn set_user_active_reports_team_name() {
    let service = service_with("backend", vec![member("u1", "Alice", true)]).await;

    let user = service.set_user_active("u1", false).await.unwrap();
    assert_eq!(user.team_name, "backend");
    assert!(!user.is_active);

    let err = service.set_user_active("ghost", true).await.unwrap_err();
    assert!(matches!(err, Error::UserNotFound(id) if id == "ghost"));
  }

  #[tokio::test]
  async fn two_member_team_assigns_the_other_member() {
    let service =
      service_with("backend", vec![member("u1", "Alice", true), member("u2", "Bob", true)]).await;

    let pr = service.create_pull_request(new_pr("pr-1", "u1")).await.unwrap();
    assert_eq!(pr.reviewers, ["u2"]);
    assert!(pr.need_more_reviewers);
  }

  #[tokio::test]
  async fn stats_count_open_and_merged_reviews() {
    // u3 is u1's only teammate and reviews everything u1 opens.
    let service = service_with("backend", vec![
      member("u1", "Alice", true),
      member("u3", "Carol", true),
    ])
    .await;
    service
      .create_team(NewTeam {
        name:    "frontend".into(),
        members: vec![member("u2", "Bob", true)],
      })
      .await
      .unwrap();

    for id in ["pr-1", "pr-2", "pr-3"] {
      let pr = service.create_pull_request(new_pr(id, "u1")).await.unwrap();
      assert_eq!(pr.reviewers, ["u3"]);
    }
    service.merge_pull_request("pr-2").await.unwrap();

    let stats = service.stats().await.unwrap();
    let names: Vec<_> = stats.iter().map(|s| s.username.as_str()).collect();
    assert_eq!(names, ["Alice", "Bob", "Carol"]);

    let carol = &stats[2];
    assert_eq!((carol.open_reviews, carol.merged_reviews), (2, 1));
    assert_eq!((stats[1].open_reviews, stats[1].merged_reviews), (0, 0));
  }

  #[tokio::test]
  async fn review_assignments_are_newest_first_and_include_merged() {
    let service =
      service_with("backend", vec![member("u1", "Alice", true), member("u2", "Bob", true)]).await;
    service.create_pull_request(new_pr("pr-1", "u1")).await.unwrap();
    service.create_pull_request(new_pr("pr-2", "u1")).await.unwrap();
    service.merge_pull_request("pr-1").await.unwrap();

    let assignments = service.review_assignments("u2").await.unwrap();
    assert_eq!(assignments.user_id, "u2");
    let ids: Vec<_> = assignments
      .pull_requests
      .iter()
      .map(|p| (p.pull_request_id.as_str(), p.status))
      .collect();
    assert_eq!(ids, [("pr-2", PrStatus::Open), ("pr-1", PrStatus::Merged)]);

    let none = service.review_assignments("ghost").await.unwrap();
    assert!(none.pull_requests.is_empty());
  }

  #[tokio::test]
  async fn merge_is_idempotent_and_blocks_reassignment() {
    let service = service_with("backend", vec![
      member("u1", "Alice", true),
      member("u2", "Bob", true),
      member("u3", "Carol", true),
      member("u4", "Dan", true),
    ])
    .await;
    let created = service.create_pull_request(new_pr("pr-1", "u1")).await.unwrap();

    let merged = service.merge_pull_request("pr-1").await.unwrap();
    let again = service.merge_pull_request("pr-1").await.unwrap();
    assert_eq!(merged, again);
    assert_eq!(again.status, PrStatus::Merged);

    let err = service
      .reassign_reviewer("pr-1", &created.reviewers[0])
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PrMerged);

    let after = service.pull_request("pr-1").await.unwrap();
    assert_eq!(after.reviewers, created.reviewers);
  }

  #[tokio::test]
  async fn deactivating_a_reviewing_team_counts_each_pr_once() {
    let service = service_with("dev", vec![member("a", "Author", true)]).await;
    service
      .create_team(NewTeam {
        name:    "qa".into(),
        members: vec![member("q1", "Quinn", true), member("q2", "Quincy", true)],
      })
      .await
      .unwrap();
    service
      .store()
      .transaction("seed", |uow| {
        let pr = PullRequest::open(new_pr("pr-1", "a"), Utc::now());
        uow.insert_pull_request(&pr)?;
        uow.assign_reviewers("pr-1", &["q1".to_owned(), "q2".to_owned()])
      })
      .await
      .unwrap();

    let report = service.deactivate_team("qa").await.unwrap();
    assert_eq!(report.deactivated_users, 2);
    assert_eq!(report.reassigned_pull_requests, 1);

    let again = service.deactivate_team("qa").await.unwrap();
    assert_eq!(again, DeactivationReport::default());
  }
}
