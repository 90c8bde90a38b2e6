//! SQL schema for the Cohort SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS seasons (
    season_id   TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    task_id     TEXT PRIMARY KEY,
    season_id   TEXT NOT NULL REFERENCES seasons(season_id),
    title       TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL
);

-- Comments are never updated; rows are only inserted or deleted.
-- parent_id points at seasons or tasks depending on parent_kind, so it
-- cannot carry a foreign key; existence is checked at insert time.
CREATE TABLE IF NOT EXISTS comments (
    comment_id  TEXT PRIMARY KEY,
    parent_kind TEXT NOT NULL CHECK (parent_kind IN ('season', 'task')),
    parent_id   TEXT NOT NULL,
    author_id   TEXT NOT NULL,
    author_name TEXT NOT NULL,
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL   -- ISO 8601 UTC, fixed width; server-assigned
);

CREATE TABLE IF NOT EXISTS participants (
    participant_id TEXT PRIMARY KEY,
    telegram_id    INTEGER NOT NULL UNIQUE,
    first_name     TEXT NOT NULL,
    last_name      TEXT,
    username       TEXT,
    region         TEXT,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participant_groups (
    group_id   TEXT PRIMARY KEY,
    status     TEXT NOT NULL,   -- 'active' | 'completed' | 'cancelled'
    region     TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id       TEXT NOT NULL REFERENCES participant_groups(group_id),
    participant_id TEXT NOT NULL REFERENCES participants(participant_id),
    position       INTEGER NOT NULL,
    PRIMARY KEY (group_id, participant_id)
);

CREATE TABLE IF NOT EXISTS feedback (
    feedback_id    TEXT PRIMARY KEY,
    participant_id TEXT NOT NULL REFERENCES participants(participant_id),
    group_id       TEXT REFERENCES participant_groups(group_id),
    content        TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS tasks_season_idx          ON tasks(season_id);
CREATE INDEX IF NOT EXISTS comments_parent_idx       ON comments(parent_kind, parent_id, created_at);
CREATE INDEX IF NOT EXISTS feedback_participant_idx  ON feedback(participant_id);
CREATE INDEX IF NOT EXISTS members_participant_idx   ON group_members(participant_id);

PRAGMA user_version = 1;
";
