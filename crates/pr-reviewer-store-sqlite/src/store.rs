//! [`SqliteStore`]: the SQLite implementation of [`Transactor`].

use std::{
  future::Future,
  path::Path,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use chrono::{DateTime, Utc};
use rusqlite::{InterruptHandle, Transaction, TransactionBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use pr_reviewer_core::{
  Error as CoreError, Result as CoreResult,
  pull_request::{PullRequest, PullRequestShort, ReviewerStats},
  store::{
    PullRequestCommands, PullRequestQueries, TeamStore, Transactor, UnitOfWork,
    UserPullRequestStore, UserStore,
  },
  team::{Team, TeamId, TeamMember, UserWithTeam},
};

use crate::{Error, Result, queries, schema::SCHEMA};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// How long a statement waits on a lock held by another connection.
  pub busy_timeout:      Duration,
  /// Deadline for one unit of work, queueing included. `None` waits forever.
  pub operation_timeout: Option<Duration>,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self { busy_timeout: Duration::from_secs(5), operation_timeout: None }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A PR reviewer store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn:              tokio_rusqlite::Connection,
  pub(crate) interrupt:         Arc<InterruptHandle>,
  pub(crate) operation_timeout: Option<Duration>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, StoreOptions::default()).await
  }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> Result<Self> {
    let busy_timeout = options.busy_timeout;
    let interrupt = conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn.get_interrupt_handle())
      })
      .await?;

    Ok(Self {
      conn,
      interrupt: Arc::new(interrupt),
      operation_timeout: options.operation_timeout,
    })
  }

  async fn run<T, F>(&self, op: &'static str, access: Access, f: F) -> CoreResult<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> CoreResult<T> + Send + 'static,
  {
    let cancel = CancellationToken::new();
    let phase = Arc::new(Mutex::new(Phase::Pending));

    // Fires on every exit, including this future being dropped; the watcher
    // only interrupts if the unit of work is still on the connection.
    let _cancel_on_exit = cancel.clone().drop_guard();
    tokio::spawn(interrupt_on_cancel(cancel.clone(), phase.clone(), self.interrupt.clone()));

    let work = self
      .conn
      .call(move |conn| Ok(run_unit(conn, op, access, &cancel, &phase, f)));

    let outcome = match self.operation_timeout {
      Some(limit) => match tokio::time::timeout(limit, work).await {
        Ok(outcome) => outcome,
        Err(_) => {
          warn!(op, ?limit, "operation deadline exceeded");
          return Err(CoreError::Cancelled);
        }
      },
      None => work.await,
    };

    outcome.map_err(Error::from)?
  }
}

// ─── Unit of work execution ──────────────────────────────────────────────────

/// Where a unit of work is relative to the connection thread.
///
/// Both the connection thread and the cancellation watcher hold the lock
/// while acting on the phase, so an interrupt is only ever issued while the
/// unit that asked for it still owns the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Pending,
  Running,
  Done,
}

fn lock(phase: &Mutex<Phase>) -> MutexGuard<'_, Phase> {
  phase.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy)]
enum Access {
  Write,
  Read,
}

/// Returns whether the connection was interrupted.
async fn interrupt_on_cancel(
  cancel: CancellationToken,
  phase: Arc<Mutex<Phase>>,
  interrupt: Arc<InterruptHandle>,
) -> bool {
  cancel.cancelled().await;
  let phase = lock(&phase);
  if *phase != Phase::Running {
    return false;
  }
  debug!("interrupting cancelled unit of work");
  interrupt.interrupt();
  true
}

/// Runs on the connection thread.
fn run_unit<T, F>(
  conn: &mut rusqlite::Connection,
  op: &'static str,
  access: Access,
  cancel: &CancellationToken,
  phase: &Mutex<Phase>,
  f: F,
) -> CoreResult<T>
where
  F: FnOnce(&mut dyn UnitOfWork) -> CoreResult<T>,
{
  {
    let mut phase = lock(phase);
    if cancel.is_cancelled() {
      debug!(op, "cancelled before start");
      *phase = Phase::Done;
      return Err(CoreError::Cancelled);
    }
    *phase = Phase::Running;
  }

  let result = execute(conn, op, access, cancel, f);
  *lock(phase) = Phase::Done;
  result
}

fn execute<T, F>(
  conn: &mut rusqlite::Connection,
  op: &'static str,
  access: Access,
  cancel: &CancellationToken,
  f: F,
) -> CoreResult<T>
where
  F: FnOnce(&mut dyn UnitOfWork) -> CoreResult<T>,
{
  let behavior = match access {
    Access::Write => TransactionBehavior::Immediate,
    Access::Read => TransactionBehavior::Deferred,
  };
  let tx = conn.transaction_with_behavior(behavior).map_err(Error::from)?;

  let mut uow = SqliteTx { tx };
  let result = f(&mut uow);
  let SqliteTx { tx } = uow;

  match result {
    Err(e) => {
      debug!(op, error = %e, "rolling back");
      rollback(tx, op);
      Err(e)
    }
    Ok(_) if cancel.is_cancelled() => {
      debug!(op, "cancelled before commit");
      rollback(tx, op);
      Err(CoreError::Cancelled)
    }
    Ok(value) => {
      match access {
        Access::Write => tx.commit().map_err(Error::from)?,
        Access::Read => rollback(tx, op),
      }
      Ok(value)
    }
  }
}

fn rollback(tx: Transaction<'_>, op: &'static str) {
  if let Err(e) = tx.rollback() {
    error!(op, error = %e, "rollback failed");
  }
}

// ─── Transactor impl ─────────────────────────────────────────────────────────

impl Transactor for SqliteStore {
  fn transaction<T, F>(
    &self,
    op: &'static str,
    f: F,
  ) -> impl Future<Output = CoreResult<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> CoreResult<T> + Send + 'static,
  {
    self.run(op, Access::Write, f)
  }

  fn read<T, F>(&self, op: &'static str, f: F) -> impl Future<Output = CoreResult<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> CoreResult<T> + Send + 'static,
  {
    self.run(op, Access::Read, f)
  }
}

// ─── Transaction handle ──────────────────────────────────────────────────────

/// The [`UnitOfWork`] handed to closures: one open SQLite transaction.
///
/// Write transactions hold the database write lock from `BEGIN IMMEDIATE`,
/// so the `lock_*` reads see rows no other writer can change until the
/// transaction ends.
struct SqliteTx<'c> {
  tx: Transaction<'c>,
}

impl TeamStore for SqliteTx<'_> {
  fn insert_team(&mut self, name: &str) -> CoreResult<Team> {
    Ok(queries::insert_team(&self.tx, name)?)
  }

  fn upsert_members(&mut self, team_id: TeamId, members: &[TeamMember]) -> CoreResult<()> {
    Ok(queries::upsert_members(&self.tx, team_id, members)?)
  }

  fn team_by_name(&self, name: &str) -> CoreResult<Option<Team>> {
    Ok(queries::team_by_name(&self.tx, name)?)
  }

  fn team_members(&self, team_id: TeamId) -> CoreResult<Vec<TeamMember>> {
    Ok(queries::team_members(&self.tx, team_id)?)
  }
}

impl UserStore for SqliteTx<'_> {
  fn set_user_active(&mut self, user_id: &str, is_active: bool) -> CoreResult<Option<UserWithTeam>> {
    Ok(queries::set_user_active(&self.tx, user_id, is_active)?)
  }

  fn deactivate_team_members(&mut self, team_id: TeamId) -> CoreResult<Vec<String>> {
    Ok(queries::deactivate_team_members(&self.tx, team_id)?)
  }
}

impl PullRequestCommands for SqliteTx<'_> {
  fn insert_pull_request(&mut self, pr: &PullRequest) -> CoreResult<()> {
    Ok(queries::insert_pull_request(&self.tx, pr)?)
  }

  fn assign_reviewers(&mut self, pull_request_id: &str, reviewer_ids: &[String]) -> CoreResult<()> {
    Ok(queries::assign_reviewers(&self.tx, pull_request_id, reviewer_ids)?)
  }

  fn lock_pull_request(&mut self, pull_request_id: &str) -> CoreResult<Option<PullRequest>> {
    Ok(queries::pull_request_row(&self.tx, pull_request_id)?)
  }

  fn mark_merged(&mut self, pull_request_id: &str, merged_at: DateTime<Utc>) -> CoreResult<()> {
    Ok(queries::mark_merged(&self.tx, pull_request_id, merged_at)?)
  }

  fn replace_reviewer(&mut self, pull_request_id: &str, old: &str, new: &str) -> CoreResult<()> {
    Ok(queries::replace_reviewer(&self.tx, pull_request_id, old, new)?)
  }
}

impl PullRequestQueries for SqliteTx<'_> {
  fn pull_request(&self, pull_request_id: &str) -> CoreResult<Option<PullRequest>> {
    Ok(queries::pull_request(&self.tx, pull_request_id)?)
  }

  fn reviewer_ids(&self, pull_request_id: &str) -> CoreResult<Vec<String>> {
    Ok(queries::reviewer_ids(&self.tx, pull_request_id)?)
  }

  fn review_assignments(&self, user_id: &str) -> CoreResult<Vec<PullRequestShort>> {
    Ok(queries::review_assignments(&self.tx, user_id)?)
  }

  fn reviewer_stats(&self) -> CoreResult<Vec<ReviewerStats>> {
    Ok(queries::reviewer_stats(&self.tx)?)
  }

  fn lock_open_pull_requests_reviewed_by(
    &mut self,
    user_ids: &[String],
  ) -> CoreResult<Vec<PullRequest>> {
    Ok(queries::open_pull_requests_reviewed_by(&self.tx, user_ids)?)
  }
}

impl UserPullRequestStore for SqliteTx<'_> {
  fn user_team_id(&self, user_id: &str) -> CoreResult<Option<TeamId>> {
    Ok(queries::user_team_id(&self.tx, user_id)?)
  }

  fn active_candidates(&self, team_id: TeamId, exclude: &[String]) -> CoreResult<Vec<String>> {
    Ok(queries::active_candidates(&self.tx, team_id, exclude)?)
  }
}
