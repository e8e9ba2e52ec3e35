//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC with
//! microsecond precision, so lexical order matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use pr_reviewer_core::pull_request::{PrStatus, PullRequest};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── PrStatus ────────────────────────────────────────────────────────────────

pub fn encode_status(status: PrStatus) -> &'static str { status.as_str() }

pub fn decode_status(s: &str) -> Result<PrStatus> {
  match s {
    "OPEN" => Ok(PrStatus::Open),
    "MERGED" => Ok(PrStatus::Merged),
    other => Err(Error::UnknownStatus(other.to_owned())),
  }
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// Column list matching [`RawPullRequest::from_row`].
pub const PULL_REQUEST_COLUMNS: &str =
  "pull_request_id, name, author_id, status, need_more_reviewers, created_at, merged_at";

/// A `pull_requests` row as read from SQLite, before decoding.
pub struct RawPullRequest {
  pub pull_request_id:     String,
  pub name:                String,
  pub author_id:           String,
  pub status:              String,
  pub need_more_reviewers: bool,
  pub created_at:          String,
  pub merged_at:           Option<String>,
}

impl RawPullRequest {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      pull_request_id:     row.get(0)?,
      name:                row.get(1)?,
      author_id:           row.get(2)?,
      status:              row.get(3)?,
      need_more_reviewers: row.get(4)?,
      created_at:          row.get(5)?,
      merged_at:           row.get(6)?,
    })
  }

  pub fn into_pull_request(self, reviewers: Vec<String>) -> Result<PullRequest> {
    Ok(PullRequest {
      pull_request_id: self.pull_request_id,
      name: self.name,
      author_id: self.author_id,
      status: decode_status(&self.status)?,
      need_more_reviewers: self.need_more_reviewers,
      created_at: decode_dt(&self.created_at)?,
      merged_at: self.merged_at.as_deref().map(decode_dt).transpose()?,
      reviewers,
    })
  }
}
