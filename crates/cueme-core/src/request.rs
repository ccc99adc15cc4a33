//! Request — the durable record of "something was asked".
//!
//! A request is written once when an agent calls cue or pause, and is never
//! deleted. Its status is the only mutable field; it moves from `Pending` to
//! a terminal state depending on how the wait ends.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// How the wait for a human response is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
  /// Bounded wait; a deadline turns the request into a cancellation.
  Cue,
  /// Unbounded wait; only an explicit resume ends it.
  Pause,
}

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
  Pending,
  Completed,
  Cancelled,
}

/// One outstanding (or historical) ask-and-wait from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
  pub id:         i64,
  /// Opaque join key with the response; unique, immutable.
  pub request_id: String,
  /// Free-text identifier of the calling agent session; may be empty.
  pub agent_id:   String,
  /// Text shown to the human.
  pub prompt:     String,
  /// Optional structured UI hint, serialized as text.
  pub payload:    Option<String>,
  pub status:     RequestStatus,
  pub created_at: DateTime<FixedOffset>,
  pub updated_at: DateTime<FixedOffset>,
}

/// Input for creating a request. Timestamps and the rowid are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewRequest {
  pub request_id: String,
  pub agent_id:   String,
  pub prompt:     String,
  pub payload:    Option<String>,
}
