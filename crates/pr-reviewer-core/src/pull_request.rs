//! Pull requests and their reviewer sets.
//!
//! A pull request is a bookkeeping record with a caller-supplied id. Its
//! status only ever moves `OPEN → MERGED`; once merged it is immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, selection::INITIAL_REVIEWERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
  Open,
  Merged,
}

impl PrStatus {
  pub fn is_merged(self) -> bool { matches!(self, Self::Merged) }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Open => "OPEN",
      Self::Merged => "MERGED",
    }
  }
}

/// Input to [`ReviewService::create_pull_request`](crate::ReviewService::create_pull_request).
#[derive(Debug, Clone)]
pub struct NewPullRequest {
  pub pull_request_id: String,
  pub name:            String,
  pub author_id:       String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
  pub pull_request_id:     String,
  #[serde(rename = "pull_request_name")]
  pub name:                String,
  pub author_id:           String,
  pub status:              PrStatus,
  /// Set when fewer than two reviewers could be found at creation time.
  /// Informational only; cleared on merge, never re-evaluated.
  pub need_more_reviewers: bool,
  #[serde(rename = "createdAt")]
  pub created_at:          DateTime<Utc>,
  #[serde(rename = "mergedAt")]
  pub merged_at:           Option<DateTime<Utc>>,
  /// Current reviewer ids. Not a column; loaded from the reviewer table.
  #[serde(rename = "assigned_reviewers")]
  pub reviewers:           Vec<String>,
}

impl PullRequest {
  /// A fresh `OPEN` pull request with no reviewers yet.
  pub fn open(new: NewPullRequest, created_at: DateTime<Utc>) -> Self {
    Self {
      pull_request_id: new.pull_request_id,
      name: new.name,
      author_id: new.author_id,
      status: PrStatus::Open,
      need_more_reviewers: true,
      created_at,
      merged_at: None,
      reviewers: Vec::new(),
    }
  }

  /// Record the reviewers picked at creation time.
  pub fn assign_initial(&mut self, reviewers: Vec<String>) {
    self.need_more_reviewers = reviewers.len() < INITIAL_REVIEWERS;
    self.reviewers = reviewers;
  }

  /// `OPEN → MERGED`. Returns `false` without touching anything when the
  /// pull request is already merged.
  pub fn merge(&mut self, at: DateTime<Utc>) -> bool {
    if self.status.is_merged() {
      return false;
    }
    self.status = PrStatus::Merged;
    self.merged_at = Some(at);
    self.need_more_reviewers = false;
    true
  }

  /// Fails with [`Error::PullRequestMerged`] once the pull request is
  /// terminal.
  pub fn ensure_open(&self) -> Result<()> {
    if self.status.is_merged() {
      return Err(Error::PullRequestMerged(self.pull_request_id.clone()));
    }
    Ok(())
  }

  pub fn has_reviewer(&self, user_id: &str) -> bool {
    self.reviewers.iter().any(|r| r == user_id)
  }

  /// Swap one reviewer slot in place. No-op if `old` is not a reviewer.
  pub fn replace_reviewer(&mut self, old: &str, new: String) {
    if let Some(slot) = self.reviewers.iter_mut().find(|r| *r == old) {
      *slot = new;
    }
  }

  pub fn summary(&self) -> PullRequestShort {
    PullRequestShort {
      pull_request_id: self.pull_request_id.clone(),
      name:            self.name.clone(),
      author_id:       self.author_id.clone(),
      status:          self.status,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
  pub pull_request_id: String,
  #[serde(rename = "pull_request_name")]
  pub name:            String,
  pub author_id:       String,
  pub status:          PrStatus,
}

/// Outcome of a single reviewer replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
  #[serde(rename = "pr")]
  pub pull_request: PullRequest,
  pub replaced_by:  String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewAssignments {
  pub user_id:       String,
  pub pull_requests: Vec<PullRequestShort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerStats {
  pub user_id:        String,
  pub username:       String,
  pub open_reviews:   u64,
  pub merged_reviews: u64,
}
