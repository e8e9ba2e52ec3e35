//! SQL for every persistence operation.
//!
//! Each function runs against the connection of an already-open
//! transaction; none of them begins or ends one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter, types::Value};

use pr_reviewer_core::{
  Error as CoreError,
  pull_request::{PrStatus, PullRequest, PullRequestShort, ReviewerStats},
  team::{Team, TeamId, TeamMember, UserWithTeam},
};

use crate::{
  Result,
  encode::{PULL_REQUEST_COLUMNS, RawPullRequest, decode_status, encode_dt, encode_status},
  error::{is_foreign_key_violation, is_unique_violation},
};

/// `?, ?, ?` with one placeholder per value.
fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

fn text_values(ids: &[String]) -> impl Iterator<Item = Value> + '_ {
  ids.iter().cloned().map(Value::Text)
}

// ─── Teams ───────────────────────────────────────────────────────────────────

pub fn insert_team(conn: &Connection, name: &str) -> Result<Team> {
  let inserted = conn.query_row(
    "INSERT INTO teams (name) VALUES (?1) RETURNING team_id, name",
    params![name],
    |row| {
      Ok(Team {
        team_id: row.get(0)?,
        name:    row.get(1)?,
      })
    },
  );

  match inserted {
    Err(e) if is_unique_violation(&e) => Err(CoreError::TeamAlreadyExists(name.to_owned()).into()),
    other => Ok(other?),
  }
}

pub fn upsert_members(conn: &Connection, team_id: TeamId, members: &[TeamMember]) -> Result<()> {
  let mut stmt = conn.prepare_cached(
    "INSERT INTO users (user_id, username, team_id, is_active)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT (user_id) DO UPDATE SET
       username  = excluded.username,
       team_id   = excluded.team_id,
       is_active = excluded.is_active",
  )?;

  for m in members {
    match stmt.execute(params![m.user_id, m.username, team_id, m.is_active]) {
      Err(e) if is_foreign_key_violation(&e) => {
        return Err(CoreError::TeamNotFound(team_id.to_string()).into());
      }
      other => {
        other?;
      }
    }
  }
  Ok(())
}

pub fn team_by_name(conn: &Connection, name: &str) -> Result<Option<Team>> {
  Ok(
    conn
      .query_row(
        "SELECT team_id, name FROM teams WHERE name = ?1",
        params![name],
        |row| {
          Ok(Team {
            team_id: row.get(0)?,
            name:    row.get(1)?,
          })
        },
      )
      .optional()?,
  )
}

pub fn team_members(conn: &Connection, team_id: TeamId) -> Result<Vec<TeamMember>> {
  let mut stmt = conn.prepare_cached(
    "SELECT user_id, username, is_active FROM users
     WHERE team_id = ?1
     ORDER BY username, user_id",
  )?;
  let members = stmt
    .query_map(params![team_id], |row| {
      Ok(TeamMember {
        user_id:   row.get(0)?,
        username:  row.get(1)?,
        is_active: row.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(members)
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub fn set_user_active(
  conn: &Connection,
  user_id: &str,
  is_active: bool,
) -> Result<Option<UserWithTeam>> {
  let changed = conn.execute(
    "UPDATE users SET is_active = ?2 WHERE user_id = ?1",
    params![user_id, is_active],
  )?;
  if changed == 0 {
    return Ok(None);
  }

  let user = conn.query_row(
    "SELECT u.user_id, u.username, t.name, u.is_active
     FROM users u JOIN teams t ON t.team_id = u.team_id
     WHERE u.user_id = ?1",
    params![user_id],
    |row| {
      Ok(UserWithTeam {
        user_id:   row.get(0)?,
        username:  row.get(1)?,
        team_name: row.get(2)?,
        is_active: row.get(3)?,
      })
    },
  )?;
  Ok(Some(user))
}

pub fn deactivate_team_members(conn: &Connection, team_id: TeamId) -> Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(
    "UPDATE users SET is_active = 0
     WHERE team_id = ?1 AND is_active = 1
     RETURNING user_id",
  )?;
  let mut ids = stmt
    .query_map(params![team_id], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  ids.sort();
  Ok(ids)
}

pub fn user_team_id(conn: &Connection, user_id: &str) -> Result<Option<TeamId>> {
  Ok(
    conn
      .query_row("SELECT team_id FROM users WHERE user_id = ?1", params![user_id], |row| {
        row.get(0)
      })
      .optional()?,
  )
}

pub fn active_candidates(conn: &Connection, team_id: TeamId, exclude: &[String]) -> Result<Vec<String>> {
  let mut sql = String::from("SELECT user_id FROM users WHERE team_id = ? AND is_active = 1");
  if !exclude.is_empty() {
    sql.push_str(&format!(" AND user_id NOT IN ({})", placeholders(exclude.len())));
  }
  sql.push_str(" ORDER BY user_id");

  let values = std::iter::once(Value::Integer(team_id)).chain(text_values(exclude));
  let mut stmt = conn.prepare(&sql)?;
  let ids = stmt
    .query_map(params_from_iter(values), |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(ids)
}

// ─── Pull requests: writes ───────────────────────────────────────────────────

pub fn insert_pull_request(conn: &Connection, pr: &PullRequest) -> Result<()> {
  let inserted = conn.execute(
    "INSERT INTO pull_requests (
       pull_request_id, name, author_id, status, need_more_reviewers, created_at, merged_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      pr.pull_request_id,
      pr.name,
      pr.author_id,
      encode_status(pr.status),
      pr.need_more_reviewers,
      encode_dt(pr.created_at),
      pr.merged_at.map(encode_dt),
    ],
  );

  match inserted {
    Err(e) if is_unique_violation(&e) => {
      Err(CoreError::PullRequestAlreadyExists(pr.pull_request_id.clone()).into())
    }
    Err(e) if is_foreign_key_violation(&e) => {
      Err(CoreError::UserNotFound(pr.author_id.clone()).into())
    }
    other => {
      other?;
      Ok(())
    }
  }
}

fn insert_reviewer(conn: &Connection, pull_request_id: &str, user_id: &str) -> Result<()> {
  let mut stmt =
    conn.prepare_cached("INSERT INTO reviewers (pull_request_id, user_id) VALUES (?1, ?2)")?;
  match stmt.execute(params![pull_request_id, user_id]) {
    Err(e) if is_foreign_key_violation(&e) => Err(CoreError::UserNotFound(user_id.to_owned()).into()),
    other => {
      other?;
      Ok(())
    }
  }
}

pub fn assign_reviewers(conn: &Connection, pull_request_id: &str, reviewer_ids: &[String]) -> Result<()> {
  for id in reviewer_ids {
    insert_reviewer(conn, pull_request_id, id)?;
  }
  Ok(())
}

pub fn mark_merged(conn: &Connection, pull_request_id: &str, merged_at: DateTime<Utc>) -> Result<()> {
  let changed = conn.execute(
    "UPDATE pull_requests
     SET status = ?2, merged_at = ?3, need_more_reviewers = 0
     WHERE pull_request_id = ?1",
    params![pull_request_id, encode_status(PrStatus::Merged), encode_dt(merged_at)],
  )?;
  if changed == 0 {
    return Err(CoreError::PullRequestNotFound(pull_request_id.to_owned()).into());
  }
  Ok(())
}

pub fn replace_reviewer(conn: &Connection, pull_request_id: &str, old: &str, new: &str) -> Result<()> {
  conn.execute(
    "DELETE FROM reviewers WHERE pull_request_id = ?1 AND user_id = ?2",
    params![pull_request_id, old],
  )?;
  insert_reviewer(conn, pull_request_id, new)
}

// ─── Pull requests: reads ────────────────────────────────────────────────────

/// The bare row; `reviewers` is left empty.
pub fn pull_request_row(conn: &Connection, pull_request_id: &str) -> Result<Option<PullRequest>> {
  let raw = conn
    .query_row(
      &format!("SELECT {PULL_REQUEST_COLUMNS} FROM pull_requests WHERE pull_request_id = ?1"),
      params![pull_request_id],
      RawPullRequest::from_row,
    )
    .optional()?;
  raw.map(|r| r.into_pull_request(Vec::new())).transpose()
}

pub fn pull_request(conn: &Connection, pull_request_id: &str) -> Result<Option<PullRequest>> {
  let Some(mut pr) = pull_request_row(conn, pull_request_id)? else {
    return Ok(None);
  };
  pr.reviewers = reviewer_ids(conn, pull_request_id)?;
  Ok(Some(pr))
}

pub fn reviewer_ids(conn: &Connection, pull_request_id: &str) -> Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(
    "SELECT user_id FROM reviewers WHERE pull_request_id = ?1 ORDER BY rowid",
  )?;
  let ids = stmt
    .query_map(params![pull_request_id], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(ids)
}

pub fn review_assignments(conn: &Connection, user_id: &str) -> Result<Vec<PullRequestShort>> {
  let mut stmt = conn.prepare_cached(
    "SELECT p.pull_request_id, p.name, p.author_id, p.status
     FROM pull_requests p
     JOIN reviewers r ON r.pull_request_id = p.pull_request_id
     WHERE r.user_id = ?1
     ORDER BY p.created_at DESC, p.rowid DESC",
  )?;
  let rows = stmt
    .query_map(params![user_id], |row| {
      Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  rows
    .into_iter()
    .map(|(pull_request_id, name, author_id, status)| {
      Ok(PullRequestShort { pull_request_id, name, author_id, status: decode_status(&status)? })
    })
    .collect()
}

pub fn reviewer_stats(conn: &Connection) -> Result<Vec<ReviewerStats>> {
  let mut stmt = conn.prepare_cached(
    "SELECT u.user_id, u.username,
            COUNT(CASE WHEN p.status = 'OPEN'   THEN 1 END),
            COUNT(CASE WHEN p.status = 'MERGED' THEN 1 END)
     FROM users u
     LEFT JOIN reviewers r     ON r.user_id = u.user_id
     LEFT JOIN pull_requests p ON p.pull_request_id = r.pull_request_id
     GROUP BY u.user_id, u.username
     ORDER BY u.username, u.user_id",
  )?;
  let stats = stmt
    .query_map([], |row| {
      Ok(ReviewerStats {
        user_id:        row.get(0)?,
        username:       row.get(1)?,
        open_reviews:   row.get::<_, i64>(2)?.unsigned_abs(),
        merged_reviews: row.get::<_, i64>(3)?.unsigned_abs(),
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(stats)
}

/// Open pull requests with at least one reviewer in `user_ids`, with their
/// full reviewer lists. Two statements regardless of how many match.
pub fn open_pull_requests_reviewed_by(conn: &Connection, user_ids: &[String]) -> Result<Vec<PullRequest>> {
  if user_ids.is_empty() {
    return Ok(Vec::new());
  }
  let matching = format!(
    "SELECT p.pull_request_id FROM pull_requests p
     WHERE p.status = 'OPEN'
       AND EXISTS (
         SELECT 1 FROM reviewers r
         WHERE r.pull_request_id = p.pull_request_id AND r.user_id IN ({})
       )",
    placeholders(user_ids.len())
  );

  let mut stmt = conn.prepare(&format!(
    "SELECT {PULL_REQUEST_COLUMNS} FROM pull_requests
     WHERE pull_request_id IN ({matching})
     ORDER BY pull_request_id"
  ))?;
  let raws = stmt
    .query_map(params_from_iter(text_values(user_ids)), RawPullRequest::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut stmt = conn.prepare(&format!(
    "SELECT pull_request_id, user_id FROM reviewers
     WHERE pull_request_id IN ({matching})
     ORDER BY rowid"
  ))?;
  let mut reviewers: HashMap<String, Vec<String>> = HashMap::new();
  let rows = stmt.query_map(params_from_iter(text_values(user_ids)), |row| {
    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
  })?;
  for row in rows {
    let (pull_request_id, user_id) = row?;
    reviewers.entry(pull_request_id).or_default().push(user_id);
  }

  raws
    .into_iter()
    .map(|raw| {
      let ids = reviewers.remove(&raw.pull_request_id).unwrap_or_default();
      raw.into_pull_request(ids)
    })
    .collect()
}
