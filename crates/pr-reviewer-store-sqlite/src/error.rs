//! Error type for `pr-reviewer-store-sqlite`.

use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] pr_reviewer_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown pull request status: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  fn sqlite(&self) -> Option<&rusqlite::Error> {
    match self {
      Self::Sqlite(e) | Self::Database(tokio_rusqlite::Error::Rusqlite(e)) => Some(e),
      _ => None,
    }
  }

  /// The statement was aborted through the connection's interrupt handle.
  pub fn is_interrupt(&self) -> bool {
    matches!(
      self.sqlite(),
      Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::OperationInterrupted
    )
  }
}

impl From<Error> for pr_reviewer_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(e) => e,
      e if e.is_interrupt() => Self::Cancelled,
      e => Self::store(e),
    }
  }
}

// ─── Constraint classification ───────────────────────────────────────────────

fn extended_code(e: &rusqlite::Error) -> Option<i32> {
  match e {
    rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
      Some(err.extended_code)
    }
    _ => None,
  }
}

/// A `UNIQUE` or `PRIMARY KEY` constraint rejected the statement.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    extended_code(e),
    Some(ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
  )
}

pub(crate) fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
  extended_code(e) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}
