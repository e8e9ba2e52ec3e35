//! Persistence traits and the transaction coordinator.
//!
//! Each trait covers one responsibility so that callers (and test fakes) only
//! depend on what they touch. A backend hands out a single handle that
//! implements all of them, a [`UnitOfWork`], for the duration of one
//! transaction via [`Transactor`].
//!
//! The traits are synchronous and object-safe: a unit of work runs to
//! completion on the backend's side, without suspending, between `BEGIN`
//! and `COMMIT`.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  Result,
  pull_request::{PullRequest, PullRequestShort, ReviewerStats},
  team::{Team, TeamId, TeamMember, UserWithTeam},
};

// ─── Teams ───────────────────────────────────────────────────────────────────

pub trait TeamStore {
  /// Insert a new team. Fails with
  /// [`Error::TeamAlreadyExists`](crate::Error::TeamAlreadyExists) when the
  /// name is taken.
  fn insert_team(&mut self, name: &str) -> Result<Team>;

  /// Insert or update each member by `user_id`, moving it to `team_id`.
  fn upsert_members(&mut self, team_id: TeamId, members: &[TeamMember]) -> Result<()>;

  fn team_by_name(&self, name: &str) -> Result<Option<Team>>;

  /// Members of a team ordered by username.
  fn team_members(&self, team_id: TeamId) -> Result<Vec<TeamMember>>;
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub trait UserStore {
  /// Returns `None` if the user does not exist.
  fn set_user_active(
    &mut self,
    user_id: &str,
    is_active: bool,
  ) -> Result<Option<UserWithTeam>>;

  /// Flip every active member of `team_id` to inactive and return their ids.
  fn deactivate_team_members(&mut self, team_id: TeamId) -> Result<Vec<String>>;
}

// ─── Pull requests: writes and locked reads ──────────────────────────────────

pub trait PullRequestCommands {
  /// Insert the pull request row only; reviewers go through
  /// [`assign_reviewers`](Self::assign_reviewers).
  ///
  /// Fails with `PullRequestAlreadyExists` on an id clash and with
  /// `UserNotFound` when the author does not exist.
  fn insert_pull_request(&mut self, pr: &PullRequest) -> Result<()>;

  fn assign_reviewers(&mut self, pull_request_id: &str, reviewer_ids: &[String]) -> Result<()>;

  /// Read a pull request while holding a write lock on it until the
  /// enclosing transaction ends. `reviewers` is left empty.
  fn lock_pull_request(&mut self, pull_request_id: &str) -> Result<Option<PullRequest>>;

  /// Set `MERGED`, stamp `merged_at` and clear `need_more_reviewers`.
  fn mark_merged(&mut self, pull_request_id: &str, merged_at: DateTime<Utc>) -> Result<()>;

  /// Delete the `old` reviewer row and insert `new` in its place.
  fn replace_reviewer(&mut self, pull_request_id: &str, old: &str, new: &str) -> Result<()>;
}

// ─── Pull requests: reads ────────────────────────────────────────────────────

pub trait PullRequestQueries {
  /// A pull request with its reviewers populated.
  fn pull_request(&self, pull_request_id: &str) -> Result<Option<PullRequest>>;

  /// Reviewer ids in assignment order.
  fn reviewer_ids(&self, pull_request_id: &str) -> Result<Vec<String>>;

  /// Pull requests `user_id` reviews, newest first.
  fn review_assignments(&self, user_id: &str) -> Result<Vec<PullRequestShort>>;

  /// Open and merged review counts for every user, ordered by username.
  fn reviewer_stats(&self) -> Result<Vec<ReviewerStats>>;

  /// Every `OPEN` pull request reviewed by at least one of `user_ids`,
  /// locked for the rest of the transaction, with reviewers populated.
  fn lock_open_pull_requests_reviewed_by(
    &mut self,
    user_ids: &[String],
  ) -> Result<Vec<PullRequest>>;
}

// ─── Cross-domain lookups ────────────────────────────────────────────────────

pub trait UserPullRequestStore {
  fn user_team_id(&self, user_id: &str) -> Result<Option<TeamId>>;

  /// Ids of active members of `team_id` that are not in `exclude`.
  fn active_candidates(&self, team_id: TeamId, exclude: &[String]) -> Result<Vec<String>>;
}

/// Everything a single transaction can do.
pub trait UnitOfWork:
  TeamStore + UserStore + PullRequestCommands + PullRequestQueries + UserPullRequestStore
{
}

impl<T> UnitOfWork for T where
  T: TeamStore + UserStore + PullRequestCommands + PullRequestQueries + UserPullRequestStore
{
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

/// Runs units of work inside backend transactions.
///
/// A unit of work that returns `Ok` is committed; one that returns `Err` (or
/// panics) is rolled back and the error is passed through unchanged.
/// Dropping the returned future cancels the operation: it either never
/// starts or is rolled back, and never commits.
pub trait Transactor: Send + Sync {
  /// Run `f` in a write transaction. Locked reads inside it are serialised
  /// against every other write transaction.
  fn transaction<T, F>(
    &self,
    op: &'static str,
    f: F,
  ) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T> + Send + 'static;

  /// Run `f` against a consistent snapshot. Nothing is committed.
  fn read<T, F>(&self, op: &'static str, f: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T> + Send + 'static;
}
