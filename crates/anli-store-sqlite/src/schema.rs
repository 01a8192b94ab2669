//! SQL schema for the anli SQLite store.
//!
//! Executed once at connection startup. Idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`; future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Single-row-per-counter allocator. The submission id counter is seeded at
-- zero; next() reads and increments inside the caller's transaction.
CREATE TABLE IF NOT EXISTS id_counter (
    name          TEXT PRIMARY KEY,
    current_value INTEGER NOT NULL
);
INSERT OR IGNORE INTO id_counter (name, current_value) VALUES ('submission_id', 0);

CREATE TABLE IF NOT EXISTS recommendations (
    id                      TEXT PRIMARY KEY,   -- decimal string, monotonic
    author_id               TEXT NOT NULL,
    author_nickname         TEXT NOT NULL,
    is_anonymous            INTEGER NOT NULL DEFAULT 0,
    guild_id                INTEGER NOT NULL,
    post_url                TEXT NOT NULL,
    original_title          TEXT NOT NULL DEFAULT '',
    original_author         TEXT NOT NULL DEFAULT '',
    original_post_timestamp TEXT NOT NULL DEFAULT '',
    recommend_title         TEXT NOT NULL,
    recommend_content       TEXT NOT NULL,
    content                 TEXT NOT NULL,      -- legacy merged rendering
    status                  TEXT NOT NULL DEFAULT 'pending',
    reviewer_id             TEXT NOT NULL DEFAULT '',
    final_amway_message_id  TEXT NOT NULL DEFAULT '',
    thread_message_id       TEXT NOT NULL DEFAULT '0',
    upvotes                 INTEGER NOT NULL DEFAULT 0,
    questions               INTEGER NOT NULL DEFAULT 0,
    downvotes               INTEGER NOT NULL DEFAULT 0,
    created_at              TEXT NOT NULL,      -- RFC 3339 UTC
    is_deleted              INTEGER NOT NULL DEFAULT 0,
    vote_file_id            TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS users (
    user_id               TEXT PRIMARY KEY,
    featured_count        INTEGER NOT NULL DEFAULT 0,
    rejected_count        INTEGER NOT NULL DEFAULT 0,
    ban_count             INTEGER NOT NULL DEFAULT 0,
    is_permanently_banned INTEGER NOT NULL DEFAULT 0,
    banned_until          TEXT                  -- RFC 3339 UTC or NULL
);

-- At most one current reaction per (submission, user). An emoji swap is
-- observed as remove-then-add at the source and one overwrite here.
CREATE TABLE IF NOT EXISTS submission_reactions (
    submission_id TEXT NOT NULL REFERENCES recommendations(id),
    user_id       TEXT NOT NULL,
    emoji         TEXT NOT NULL,                -- bucket name, not raw emoji
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (submission_id, user_id)
);

CREATE INDEX IF NOT EXISTS recommendations_author_idx
    ON recommendations(author_id);
CREATE INDEX IF NOT EXISTS recommendations_final_msg_idx
    ON recommendations(final_amway_message_id);

PRAGMA user_version = 1;
";
