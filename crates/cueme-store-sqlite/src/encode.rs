//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with the local timezone offset
//! and millisecond precision; statuses as their UPPERCASE names.

use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use cueme_core::{Request, RequestStatus, ResponseRow};

use crate::{Error, Result};

// ─── DateTime<FixedOffset> ───────────────────────────────────────────────────

/// Now, in the local timezone, as stored on disk.
pub fn now_local() -> DateTime<FixedOffset> {
  Local::now().fixed_offset()
}

pub fn encode_dt(dt: DateTime<FixedOffset>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}

pub fn decode_dt(s: &str) -> Result<DateTime<FixedOffset>> {
  DateTime::parse_from_rfc3339(s).map_err(|e| Error::DateParse(e.to_string()))
}

// ─── RequestStatus ───────────────────────────────────────────────────────────

pub fn encode_status(status: RequestStatus) -> &'static str {
  match status {
    RequestStatus::Pending => "PENDING",
    RequestStatus::Completed => "COMPLETED",
    RequestStatus::Cancelled => "CANCELLED",
  }
}

pub fn decode_status(s: &str) -> Result<RequestStatus> {
  match s {
    "PENDING" => Ok(RequestStatus::Pending),
    "COMPLETED" => Ok(RequestStatus::Completed),
    "CANCELLED" => Ok(RequestStatus::Cancelled),
    other => Err(Error::UnknownStatus(other.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `cue_requests` row.
pub struct RawRequest {
  pub id:         i64,
  pub request_id: String,
  pub agent_id:   String,
  pub prompt:     String,
  pub payload:    Option<String>,
  pub status:     String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawRequest {
  pub fn into_request(self) -> Result<Request> {
    Ok(Request {
      id:         self.id,
      request_id: self.request_id,
      agent_id:   self.agent_id,
      prompt:     self.prompt,
      payload:    self.payload,
      status:     decode_status(&self.status)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `cue_responses` row.
pub struct RawResponse {
  pub id:            i64,
  pub request_id:    String,
  pub response_json: String,
  pub cancelled:     i64,
  pub created_at:    String,
}

impl RawResponse {
  pub fn into_response(self) -> Result<ResponseRow> {
    Ok(ResponseRow {
      id:            self.id,
      request_id:    self.request_id,
      response_json: self.response_json,
      cancelled:     self.cancelled != 0,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
