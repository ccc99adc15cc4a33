//! Response rows and the tagged parse of their JSON bodies.
//!
//! A response body is untyped JSON on disk. It is resolved exactly once, at
//! the boundary, into [`ResponseBody`]: the legacy shape (inline base64
//! images), the current shape (attachments live in the join table), or
//! `Unparseable`. Parsing never fails; malformed content degrades.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Stored rows ─────────────────────────────────────────────────────────────

/// A `cue_responses` row as stored. Once created for a `request_id` it is
/// never overwritten, except by migration rewriting its body in place.
#[derive(Debug, Clone)]
pub struct ResponseRow {
  pub id:            i64,
  pub request_id:    String,
  pub response_json: String,
  /// Distinguishes a synthesized/explicit cancellation from a real empty
  /// answer.
  pub cancelled:     bool,
  pub created_at:    DateTime<FixedOffset>,
}

/// A resolved attachment reference, ordered by join-table `idx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
  /// Storage-relative path, e.g. `files/<sha256>.png`.
  pub file:      String,
  pub mime_type: String,
}

/// Input for upserting a `cue_files` row. Two attachments with identical
/// bytes share one row; the sha256 is the identity.
#[derive(Debug, Clone)]
pub struct NewFile {
  pub sha256:     String,
  pub file:       String,
  pub mime_type:  String,
  pub size_bytes: u64,
}

// ─── Body parse ──────────────────────────────────────────────────────────────

/// An inline attachment in the legacy (pre-migration) body shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
  pub mime_type:   String,
  pub base64_data: String,
}

/// The decoded body of a response, resolved once from its raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
  /// Post-migration shape: `{ text, mentions? }`.
  Current {
    text:     String,
    mentions: Option<Vec<Value>>,
  },
  /// Pre-migration shape: `{ text, images: [{ mime_type, base64_data }] }`.
  Legacy {
    text:     String,
    images:   Vec<InlineImage>,
    mentions: Option<Vec<Value>>,
  },
  /// Not JSON, or not a JSON object. Treated as an empty answer on the
  /// read path and as a corrupt record by migration.
  Unparseable,
}

impl ResponseBody {
  /// Resolve a raw body. The presence of an `images` array is what marks a
  /// body as legacy; everything else that is an object is current.
  pub fn parse(raw: &str) -> Self {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
      return Self::Unparseable;
    };
    let Some(obj) = value.as_object() else {
      return Self::Unparseable;
    };

    let text = obj
      .get("text")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_owned();

    let mentions = obj.get("mentions").and_then(Value::as_array).cloned();

    if let Some(images) = obj.get("images").and_then(Value::as_array) {
      let images = images
        .iter()
        .map(|img| InlineImage {
          mime_type:   img
            .get("mime_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
          base64_data: img
            .get("base64_data")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        })
        .collect();
      return Self::Legacy { text, images, mentions };
    }

    Self::Current { text, mentions }
  }

  /// The human's text, empty for unparseable bodies.
  pub fn text(&self) -> &str {
    match self {
      Self::Current { text, .. } | Self::Legacy { text, .. } => text,
      Self::Unparseable => "",
    }
  }

  /// The normalized current-shape JSON: `{ text }` plus `mentions` when the
  /// body carried them. Attachments are never embedded.
  pub fn normalized_json(&self) -> Value {
    match self {
      Self::Current {
        text,
        mentions: Some(mentions),
      }
      | Self::Legacy {
        text,
        mentions: Some(mentions),
        ..
      } => serde_json::json!({ "text": text, "mentions": mentions }),
      Self::Current { text, .. } | Self::Legacy { text, .. } => {
        serde_json::json!({ "text": text })
      }
      Self::Unparseable => serde_json::json!({ "text": "" }),
    }
  }
}
