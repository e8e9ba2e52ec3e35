//! An in-memory [`Transactor`] for tests and local experiments.
//!
//! Each unit of work runs against a private copy of the state; the copy
//! replaces the shared state only when the unit of work returns `Ok`. The
//! shared state is locked for the whole unit of work, so transactions are
//! fully serialised.

use std::{
  future::Future,
  sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
  Error, Result,
  pull_request::{PrStatus, PullRequest, PullRequestShort, ReviewerStats},
  store::{
    PullRequestCommands, PullRequestQueries, TeamStore, Transactor, UnitOfWork,
    UserPullRequestStore, UserStore,
  },
  team::{Team, TeamId, TeamMember, User, UserWithTeam},
};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  state: Arc<Mutex<State>>,
}

#[derive(Debug, Clone, Default)]
struct State {
  next_team_id:  TeamId,
  teams:         Vec<Team>,
  users:         Vec<User>,
  /// Insertion order; reviewers are kept inline in assignment order.
  pull_requests: Vec<PullRequest>,
}

impl MemoryStore {
  fn run<T, F>(&self, op: &'static str, commit: bool, f: F) -> Result<T>
  where
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T>,
  {
    let mut shared = self
      .state
      .lock()
      .map_err(|_| Error::store("memory store lock poisoned"))?;

    let mut scratch = shared.clone();
    match f(&mut scratch) {
      Ok(value) => {
        if commit {
          *shared = scratch;
        }
        Ok(value)
      }
      Err(e) => {
        debug!(op, error = %e, "rolling back");
        Err(e)
      }
    }
  }
}

impl Transactor for MemoryStore {
  fn transaction<T, F>(
    &self,
    op: &'static str,
    f: F,
  ) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T> + Send + 'static,
  {
    async move { self.run(op, true, f) }
  }

  fn read<T, F>(&self, op: &'static str, f: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T> + Send + 'static,
  {
    async move { self.run(op, false, f) }
  }
}

// ─── State helpers ───────────────────────────────────────────────────────────

impl State {
  fn user(&self, user_id: &str) -> Option<&User> {
    self.users.iter().find(|u| u.user_id == user_id)
  }

  fn pr(&self, pull_request_id: &str) -> Option<&PullRequest> {
    self.pull_requests.iter().find(|p| p.pull_request_id == pull_request_id)
  }

  fn pr_mut(&mut self, pull_request_id: &str) -> Result<&mut PullRequest> {
    self
      .pull_requests
      .iter_mut()
      .find(|p| p.pull_request_id == pull_request_id)
      .ok_or_else(|| Error::PullRequestNotFound(pull_request_id.to_owned()))
  }

  /// Mirrors the reviewer table constraints: the user must exist, must not be
  /// the author, and must not already review the pull request.
  fn check_reviewer(&self, pr: &PullRequest, user_id: &str) -> Result<()> {
    if self.user(user_id).is_none() {
      return Err(Error::UserNotFound(user_id.to_owned()));
    }
    if pr.author_id == user_id {
      return Err(Error::store(format!(
        "author {user_id} cannot review pull request {}",
        pr.pull_request_id
      )));
    }
    if pr.has_reviewer(user_id) {
      return Err(Error::store(format!(
        "{user_id} already reviews pull request {}",
        pr.pull_request_id
      )));
    }
    Ok(())
  }
}

// ─── Teams ───────────────────────────────────────────────────────────────────

impl TeamStore for State {
  fn insert_team(&mut self, name: &str) -> Result<Team> {
    if self.teams.iter().any(|t| t.name == name) {
      return Err(Error::TeamAlreadyExists(name.to_owned()));
    }
    self.next_team_id += 1;
    let team = Team { team_id: self.next_team_id, name: name.to_owned() };
    self.teams.push(team.clone());
    Ok(team)
  }

  fn upsert_members(&mut self, team_id: TeamId, members: &[TeamMember]) -> Result<()> {
    if !self.teams.iter().any(|t| t.team_id == team_id) {
      return Err(Error::TeamNotFound(team_id.to_string()));
    }
    for m in members {
      let user = User {
        user_id: m.user_id.clone(),
        username: m.username.clone(),
        team_id,
        is_active: m.is_active,
      };
      match self.users.iter_mut().find(|u| u.user_id == m.user_id) {
        Some(existing) => *existing = user,
        None => self.users.push(user),
      }
    }
    Ok(())
  }

  fn team_by_name(&self, name: &str) -> Result<Option<Team>> {
    Ok(self.teams.iter().find(|t| t.name == name).cloned())
  }

  fn team_members(&self, team_id: TeamId) -> Result<Vec<TeamMember>> {
    let mut members: Vec<&User> = self.users.iter().filter(|u| u.team_id == team_id).collect();
    members.sort_by(|a, b| (&a.username, &a.user_id).cmp(&(&b.username, &b.user_id)));
    Ok(
      members
        .into_iter()
        .map(|u| TeamMember {
          user_id:   u.user_id.clone(),
          username:  u.username.clone(),
          is_active: u.is_active,
        })
        .collect(),
    )
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

impl UserStore for State {
  fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<Option<UserWithTeam>> {
    let Some(user) = self.users.iter_mut().find(|u| u.user_id == user_id) else {
      return Ok(None);
    };
    user.is_active = is_active;
    let user = user.clone();

    let team_name = self
      .teams
      .iter()
      .find(|t| t.team_id == user.team_id)
      .map(|t| t.name.clone())
      .ok_or_else(|| Error::TeamNotFound(user.team_id.to_string()))?;

    Ok(Some(UserWithTeam {
      user_id: user.user_id,
      username: user.username,
      team_name,
      is_active: user.is_active,
    }))
  }

  fn deactivate_team_members(&mut self, team_id: TeamId) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for user in self.users.iter_mut().filter(|u| u.team_id == team_id && u.is_active) {
      user.is_active = false;
      ids.push(user.user_id.clone());
    }
    ids.sort();
    Ok(ids)
  }
}

// ─── Pull requests ───────────────────────────────────────────────────────────

impl PullRequestCommands for State {
  fn insert_pull_request(&mut self, pr: &PullRequest) -> Result<()> {
    if self.pr(&pr.pull_request_id).is_some() {
      return Err(Error::PullRequestAlreadyExists(pr.pull_request_id.clone()));
    }
    if self.user(&pr.author_id).is_none() {
      return Err(Error::UserNotFound(pr.author_id.clone()));
    }
    self.pull_requests.push(PullRequest { reviewers: Vec::new(), ..pr.clone() });
    Ok(())
  }

  fn assign_reviewers(&mut self, pull_request_id: &str, reviewer_ids: &[String]) -> Result<()> {
    let mut pr = self.pr_mut(pull_request_id)?.clone();
    for id in reviewer_ids {
      self.check_reviewer(&pr, id)?;
      pr.reviewers.push(id.clone());
    }
    *self.pr_mut(pull_request_id)? = pr;
    Ok(())
  }

  fn lock_pull_request(&mut self, pull_request_id: &str) -> Result<Option<PullRequest>> {
    Ok(
      self
        .pr(pull_request_id)
        .map(|p| PullRequest { reviewers: Vec::new(), ..p.clone() }),
    )
  }

  fn mark_merged(&mut self, pull_request_id: &str, merged_at: DateTime<Utc>) -> Result<()> {
    let pr = self.pr_mut(pull_request_id)?;
    pr.status = PrStatus::Merged;
    pr.merged_at = Some(merged_at);
    pr.need_more_reviewers = false;
    Ok(())
  }

  fn replace_reviewer(&mut self, pull_request_id: &str, old: &str, new: &str) -> Result<()> {
    let mut pr = self.pr_mut(pull_request_id)?.clone();
    pr.reviewers.retain(|r| r != old);
    self.check_reviewer(&pr, new)?;
    pr.reviewers.push(new.to_owned());
    *self.pr_mut(pull_request_id)? = pr;
    Ok(())
  }
}

impl PullRequestQueries for State {
  fn pull_request(&self, pull_request_id: &str) -> Result<Option<PullRequest>> {
    Ok(self.pr(pull_request_id).cloned())
  }

  fn reviewer_ids(&self, pull_request_id: &str) -> Result<Vec<String>> {
    Ok(self.pr(pull_request_id).map(|p| p.reviewers.clone()).unwrap_or_default())
  }

  fn review_assignments(&self, user_id: &str) -> Result<Vec<PullRequestShort>> {
    // Newest insertions first so that the stable sort breaks timestamp ties
    // the same way.
    let mut prs: Vec<&PullRequest> =
      self.pull_requests.iter().rev().filter(|p| p.has_reviewer(user_id)).collect();
    prs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(prs.into_iter().map(PullRequest::summary).collect())
  }

  fn reviewer_stats(&self) -> Result<Vec<ReviewerStats>> {
    let mut users: Vec<&User> = self.users.iter().collect();
    users.sort_by(|a, b| (&a.username, &a.user_id).cmp(&(&b.username, &b.user_id)));

    Ok(
      users
        .into_iter()
        .map(|u| {
          let reviewing = self.pull_requests.iter().filter(|p| p.has_reviewer(&u.user_id));
          let (merged, open): (Vec<_>, Vec<_>) = reviewing.partition(|p| p.status.is_merged());
          ReviewerStats {
            user_id:        u.user_id.clone(),
            username:       u.username.clone(),
            open_reviews:   open.len() as u64,
            merged_reviews: merged.len() as u64,
          }
        })
        .collect(),
    )
  }

  fn lock_open_pull_requests_reviewed_by(
    &mut self,
    user_ids: &[String],
  ) -> Result<Vec<PullRequest>> {
    let mut prs: Vec<PullRequest> = self
      .pull_requests
      .iter()
      .filter(|p| !p.status.is_merged())
      .filter(|p| user_ids.iter().any(|id| p.has_reviewer(id)))
      .cloned()
      .collect();
    prs.sort_by(|a, b| a.pull_request_id.cmp(&b.pull_request_id));
    Ok(prs)
  }
}

impl UserPullRequestStore for State {
  fn user_team_id(&self, user_id: &str) -> Result<Option<TeamId>> {
    Ok(self.user(user_id).map(|u| u.team_id))
  }

  fn active_candidates(&self, team_id: TeamId, exclude: &[String]) -> Result<Vec<String>> {
    let mut ids: Vec<String> = self
      .users
      .iter()
      .filter(|u| u.team_id == team_id && u.is_active)
      .filter(|u| !exclude.contains(&u.user_id))
      .map(|u| u.user_id.clone())
      .collect();
    ids.sort();
    Ok(ids)
  }
}
