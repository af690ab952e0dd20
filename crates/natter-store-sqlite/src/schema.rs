//! SQL schema for the natter SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- There is no level column: depth is derived from parent_id on read.
-- parent_id carries no foreign key so that rows orphaned by old data are
-- still loadable; cascades are done by delete_subtree.
CREATE TABLE IF NOT EXISTS comments (
    comment_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id  INTEGER NOT NULL,
    author_id   INTEGER NOT NULL,
    content     TEXT    NOT NULL,
    created_at  TEXT    NOT NULL,   -- RFC 3339 UTC, fixed width; store-assigned
    hidden      INTEGER NOT NULL DEFAULT 0,
    parent_id   INTEGER             -- NULL for top-level comments
);

CREATE INDEX IF NOT EXISTS comments_subject_idx
    ON comments(subject_id, created_at, comment_id);
CREATE INDEX IF NOT EXISTS comments_parent_idx ON comments(parent_id);

PRAGMA user_version = 1;
";
