//! SQL schema for the cueme SQLite store.
//!
//! Executed once at connection startup. The table layout is the durable
//! contract: the human-facing responder reads `cue_requests` and writes
//! `cue_responses` against the same file.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Requests are never deleted; they are the permanent log of asks.
CREATE TABLE IF NOT EXISTS cue_requests (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id TEXT NOT NULL UNIQUE,
    agent_id   TEXT NOT NULL DEFAULT '',
    prompt     TEXT NOT NULL,
    payload    TEXT,
    status     TEXT NOT NULL DEFAULT 'PENDING',  -- PENDING | COMPLETED | CANCELLED
    created_at TEXT NOT NULL,                    -- RFC 3339 with offset
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS ix_cue_requests_request_id ON cue_requests(request_id);
CREATE INDEX IF NOT EXISTS ix_cue_requests_agent_id   ON cue_requests(agent_id);

-- At most one response per request; the UNIQUE constraint is what resolves
-- the timeout race.
CREATE TABLE IF NOT EXISTS cue_responses (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id    TEXT NOT NULL UNIQUE,
    response_json TEXT NOT NULL,
    cancelled     INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS ix_cue_responses_request_id ON cue_responses(request_id);

-- Content-addressed attachments; identical bytes share one row.
CREATE TABLE IF NOT EXISTS cue_files (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    sha256     TEXT NOT NULL UNIQUE,
    file       TEXT NOT NULL,                    -- storage-relative path
    mime_type  TEXT NOT NULL DEFAULT 'application/octet-stream',
    size_bytes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Ordered many-to-many join; idx is contiguous from 0 per response.
CREATE TABLE IF NOT EXISTS cue_response_files (
    response_id INTEGER NOT NULL REFERENCES cue_responses(id),
    file_id     INTEGER NOT NULL REFERENCES cue_files(id),
    idx         INTEGER NOT NULL,
    PRIMARY KEY (response_id, idx)
);

-- Single-row migration gate, keyed 'schema_version'.
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";
