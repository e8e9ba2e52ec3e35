//! Error types for `pr-reviewer-core`.

use thiserror::Error;

/// Coarse classification of an [`Error`], used by transports to choose a
/// client-facing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  AlreadyExists,
  PrMerged,
  ReviewerNotAssigned,
  NoCandidate,
  Cancelled,
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("team not found: {0}")]
  TeamNotFound(String),

  #[error("user not found: {0}")]
  UserNotFound(String),

  #[error("pull request not found: {0}")]
  PullRequestNotFound(String),

  #[error("team '{0}' already exists")]
  TeamAlreadyExists(String),

  #[error("pull request '{0}' already exists")]
  PullRequestAlreadyExists(String),

  #[error("cannot modify merged pull request {0}")]
  PullRequestMerged(String),

  #[error("reviewer {reviewer_id} is not assigned to pull request {pull_request_id}")]
  ReviewerNotAssigned {
    pull_request_id: String,
    reviewer_id:     String,
  },

  #[error(
    "no active replacement candidate for reviewer {reviewer_id} on pull request {pull_request_id}"
  )]
  NoCandidate {
    pull_request_id: String,
    reviewer_id:     String,
  },

  /// The caller dropped the operation or its deadline elapsed.
  #[error("operation cancelled")]
  Cancelled,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend failure.
  pub fn store(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self::Store(e.into())
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::TeamNotFound(_) | Self::UserNotFound(_) | Self::PullRequestNotFound(_) => {
        ErrorKind::NotFound
      }
      Self::TeamAlreadyExists(_) | Self::PullRequestAlreadyExists(_) => {
        ErrorKind::AlreadyExists
      }
      Self::PullRequestMerged(_) => ErrorKind::PrMerged,
      Self::ReviewerNotAssigned { .. } => ErrorKind::ReviewerNotAssigned,
      Self::NoCandidate { .. } => ErrorKind::NoCandidate,
      Self::Cancelled => ErrorKind::Cancelled,
      Self::Store(_) => ErrorKind::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
