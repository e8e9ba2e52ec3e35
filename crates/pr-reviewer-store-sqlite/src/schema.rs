//! SQL schema for the PR reviewer SQLite store.
//!
//! Executed once at connection startup. The schema version is recorded in
//! `PRAGMA user_version`; future migrations will be gated on it.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS teams (
    team_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    name     TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS users (
    user_id    TEXT PRIMARY KEY,
    username   TEXT NOT NULL,
    team_id    INTEGER NOT NULL REFERENCES teams(team_id),
    is_active  INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1))
);

CREATE TABLE IF NOT EXISTS pull_requests (
    pull_request_id      TEXT PRIMARY KEY,
    name                 TEXT NOT NULL,
    author_id            TEXT NOT NULL REFERENCES users(user_id),
    status               TEXT NOT NULL DEFAULT 'OPEN' CHECK (status IN ('OPEN', 'MERGED')),
    need_more_reviewers  INTEGER NOT NULL DEFAULT 0,
    created_at           TEXT NOT NULL,   -- RFC 3339 UTC, microseconds
    merged_at            TEXT
);

-- Rows are deleted and re-inserted on replacement, never updated.
-- rowid order is assignment order.
CREATE TABLE IF NOT EXISTS reviewers (
    pull_request_id  TEXT NOT NULL REFERENCES pull_requests(pull_request_id) ON DELETE CASCADE,
    user_id          TEXT NOT NULL REFERENCES users(user_id),
    PRIMARY KEY (pull_request_id, user_id)
);

CREATE TRIGGER IF NOT EXISTS reviewers_exclude_author
BEFORE INSERT ON reviewers
WHEN NEW.user_id = (
    SELECT author_id FROM pull_requests WHERE pull_request_id = NEW.pull_request_id
)
BEGIN
    SELECT RAISE(ABORT, 'a pull request author cannot review it');
END;

CREATE INDEX IF NOT EXISTS users_team_active_idx   ON users(team_id, is_active);
CREATE INDEX IF NOT EXISTS reviewers_user_idx      ON reviewers(user_id);
CREATE INDEX IF NOT EXISTS pull_requests_status_idx ON pull_requests(status);

PRAGMA user_version = 1;
";
