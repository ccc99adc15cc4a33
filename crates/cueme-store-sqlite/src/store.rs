//! [`SqliteStore`] — the SQLite implementation of [`CueStore`].

use std::path::Path;

use cueme_core::{
  CueStore, NewFile, NewRequest, Request, RequestStatus, ResponseRow,
  response::FileRef,
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{RawRequest, RawResponse, encode_dt, encode_status, now_local},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A cueme store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. No lock is
/// held between calls, so independent invocations against the same file can
/// read and write freely while one of them polls.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

const REQUEST_COLUMNS: &str =
  "id, request_id, agent_id, prompt, payload, status, created_at, updated_at";

fn read_request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRequest> {
  Ok(RawRequest {
    id:         row.get(0)?,
    request_id: row.get(1)?,
    agent_id:   row.get(2)?,
    prompt:     row.get(3)?,
    payload:    row.get(4)?,
    status:     row.get(5)?,
    created_at: row.get(6)?,
    updated_at: row.get(7)?,
  })
}

fn read_response_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawResponse> {
  Ok(RawResponse {
    id:            row.get(0)?,
    request_id:    row.get(1)?,
    response_json: row.get(2)?,
    cancelled:     row.get(3)?,
    created_at:    row.get(4)?,
  })
}

// ─── CueStore impl ───────────────────────────────────────────────────────────

impl CueStore for SqliteStore {
  type Error = Error;

  // ── Requests ──────────────────────────────────────────────────────────────

  async fn insert_request(&self, input: NewRequest) -> Result<Request> {
    let now = now_local();
    let request = Request {
      id:         0,
      request_id: input.request_id,
      agent_id:   input.agent_id,
      prompt:     input.prompt,
      payload:    input.payload,
      status:     RequestStatus::Pending,
      created_at: now,
      updated_at: now,
    };

    let request_id = request.request_id.clone();
    let agent_id   = request.agent_id.clone();
    let prompt     = request.prompt.clone();
    let payload    = request.payload.clone();
    let status     = encode_status(request.status).to_owned();
    let at_str     = encode_dt(now);

    let id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cue_requests (
             request_id, agent_id, prompt, payload, status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![request_id, agent_id, prompt, payload, status, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Request { id, ..request })
  }

  async fn find_request(&self, request_id: &str) -> Result<Option<Request>> {
    let request_id = request_id.to_owned();
    let raw: Option<RawRequest> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {REQUEST_COLUMNS} FROM cue_requests WHERE request_id = ?1"
              ),
              rusqlite::params![request_id],
              read_request_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRequest::into_request).transpose()
  }

  async fn pending_requests(&self) -> Result<Vec<Request>> {
    let raws: Vec<RawRequest> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {REQUEST_COLUMNS} FROM cue_requests
           WHERE status = 'PENDING'
           ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt
          .query_map([], read_request_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRequest::into_request).collect()
  }

  async fn set_request_status(
    &self,
    request_id: &str,
    status: RequestStatus,
  ) -> Result<()> {
    let request_id = request_id.to_owned();
    let status_str = encode_status(status).to_owned();
    let at_str     = encode_dt(now_local());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE cue_requests SET status = ?1, updated_at = ?2 WHERE request_id = ?3",
          rusqlite::params![status_str, at_str, request_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn latest_agent_for_prompt(&self, hint: &str) -> Result<Option<String>> {
    let hint = hint.to_owned();
    let agent: Option<String> = self
      .conn
      .call(move |conn| {
        // instr() keeps the match case-sensitive; LIKE would fold ASCII case.
        Ok(
          conn
            .query_row(
              "SELECT agent_id FROM cue_requests
               WHERE agent_id != '' AND instr(prompt, ?1) > 0
               ORDER BY created_at DESC, id DESC
               LIMIT 1",
              rusqlite::params![hint],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(agent)
  }

  // ── Responses ─────────────────────────────────────────────────────────────

  async fn find_response(&self, request_id: &str) -> Result<Option<ResponseRow>> {
    let request_id = request_id.to_owned();
    let raw: Option<RawResponse> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, request_id, response_json, cancelled, created_at
               FROM cue_responses WHERE request_id = ?1",
              rusqlite::params![request_id],
              read_response_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawResponse::into_response).transpose()
  }

  async fn insert_response_if_absent(
    &self,
    request_id: &str,
    response_json: &str,
    cancelled: bool,
  ) -> Result<bool> {
    let request_id    = request_id.to_owned();
    let response_json = response_json.to_owned();
    let at_str        = encode_dt(now_local());

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT OR IGNORE INTO cue_responses
             (request_id, response_json, cancelled, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![request_id, response_json, cancelled as i64, at_str],
        )?;
        Ok(changed > 0)
      })
      .await?;
    Ok(inserted)
  }

  async fn files_for_response(&self, response_id: i64) -> Result<Vec<FileRef>> {
    let refs: Vec<FileRef> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT f.file, f.mime_type
           FROM cue_response_files rf
           JOIN cue_files f ON f.id = rf.file_id
           WHERE rf.response_id = ?1
           ORDER BY rf.idx ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![response_id], |row| {
            Ok(FileRef { file: row.get(0)?, mime_type: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(refs)
  }

  // ── Schema gate ───────────────────────────────────────────────────────────

  async fn schema_version(&self) -> Result<Option<String>> {
    let version: Option<String> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM schema_meta WHERE key = 'schema_version'",
              [],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(version)
  }

  async fn set_schema_version(&self, version: &str) -> Result<()> {
    let version = version.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
          rusqlite::params![version],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn has_activity(&self) -> Result<bool> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT (SELECT COUNT(*) FROM cue_requests)
                + (SELECT COUNT(*) FROM cue_responses)",
          [],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count > 0)
  }

  // ── Migration ─────────────────────────────────────────────────────────────

  async fn list_responses(&self) -> Result<Vec<ResponseRow>> {
    let raws: Vec<RawResponse> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT id, request_id, response_json, cancelled, created_at
           FROM cue_responses ORDER BY id ASC",
        )?;
        let rows = stmt
          .query_map([], read_response_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResponse::into_response).collect()
  }

  async fn rewrite_response(
    &self,
    response_id: i64,
    response_json: &str,
    files: &[NewFile],
  ) -> Result<()> {
    let response_json = response_json.to_owned();
    let files         = files.to_vec();
    let at_str        = encode_dt(now_local());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          "DELETE FROM cue_response_files WHERE response_id = ?1",
          rusqlite::params![response_id],
        )?;

        for (idx, file) in files.iter().enumerate() {
          tx.execute(
            "INSERT INTO cue_files (sha256, file, mime_type, size_bytes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(sha256) DO UPDATE SET
               file = excluded.file,
               mime_type = excluded.mime_type,
               size_bytes = excluded.size_bytes",
            rusqlite::params![
              file.sha256,
              file.file,
              file.mime_type,
              file.size_bytes as i64,
              at_str,
            ],
          )?;

          let file_id: i64 = tx.query_row(
            "SELECT id FROM cue_files WHERE sha256 = ?1",
            rusqlite::params![file.sha256],
            |row| row.get(0),
          )?;

          tx.execute(
            "INSERT INTO cue_response_files (response_id, file_id, idx)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![response_id, file_id, idx as i64],
          )?;
        }

        tx.execute(
          "UPDATE cue_responses SET response_json = ?1 WHERE id = ?2",
          rusqlite::params![response_json, response_id],
        )?;

        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn drop_response(&self, response_id: i64, request_id: &str) -> Result<()> {
    let request_id = request_id.to_owned();
    let at_str     = encode_dt(now_local());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM cue_response_files WHERE response_id = ?1",
          rusqlite::params![response_id],
        )?;
        tx.execute(
          "DELETE FROM cue_responses WHERE id = ?1",
          rusqlite::params![response_id],
        )?;
        tx.execute(
          "UPDATE cue_requests SET status = 'CANCELLED', updated_at = ?1
           WHERE request_id = ?2",
          rusqlite::params![at_str, request_id],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
