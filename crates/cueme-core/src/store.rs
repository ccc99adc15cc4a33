//! The `CueStore` trait.
//!
//! Implemented by storage backends (e.g. `cueme-store-sqlite`). The engine
//! depends on this abstraction, not on any concrete backend. Every method is
//! a single round trip; the store holds no lock between calls, so concurrent
//! invocations against the same database stay independent.

use std::future::Future;

use crate::request::{NewRequest, Request, RequestStatus};
use crate::response::{FileRef, NewFile, ResponseRow};

/// Abstraction over the durable rendezvous store.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait CueStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Requests ──────────────────────────────────────────────────────────

  /// Persist a new `PENDING` request. Timestamps are set by the store.
  fn insert_request(
    &self,
    input: NewRequest,
  ) -> impl Future<Output = Result<Request, Self::Error>> + Send + '_;

  /// Look up a request by its opaque token. Returns `None` if not found.
  fn find_request<'a>(
    &'a self,
    request_id: &'a str,
  ) -> impl Future<Output = Result<Option<Request>, Self::Error>> + Send + 'a;

  /// All `PENDING` requests, oldest first. This is the read a human-facing
  /// responder uses to discover outstanding asks.
  fn pending_requests(
    &self,
  ) -> impl Future<Output = Result<Vec<Request>, Self::Error>> + Send + '_;

  /// Move a request to a new status, bumping `updated_at`.
  fn set_request_status<'a>(
    &'a self,
    request_id: &'a str,
    status: RequestStatus,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The most recently created non-empty `agent_id` whose prompt contains
  /// `hint` as a case-sensitive substring.
  fn latest_agent_for_prompt<'a>(
    &'a self,
    hint: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  // ── Responses ─────────────────────────────────────────────────────────

  /// Fresh read of the response for a request, if one has committed.
  fn find_response<'a>(
    &'a self,
    request_id: &'a str,
  ) -> impl Future<Output = Result<Option<ResponseRow>, Self::Error>> + Send + 'a;

  /// Conditionally insert a response, relying on the UNIQUE `request_id`
  /// constraint: if a response already exists the insert is a no-op and
  /// `false` is returned. This is the timeout-race guard.
  fn insert_response_if_absent<'a>(
    &'a self,
    request_id: &'a str,
    response_json: &'a str,
    cancelled: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Attachment references for a response, in join-table `idx` order.
  fn files_for_response(
    &self,
    response_id: i64,
  ) -> impl Future<Output = Result<Vec<FileRef>, Self::Error>> + Send + '_;

  // ── Schema gate ───────────────────────────────────────────────────────

  /// The persisted `schema_version` marker, if any.
  fn schema_version(
    &self,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  fn set_schema_version<'a>(
    &'a self,
    version: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Whether any request or response rows exist at all.
  fn has_activity(
    &self,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Migration ─────────────────────────────────────────────────────────

  /// Every response row, oldest first.
  fn list_responses(
    &self,
  ) -> impl Future<Output = Result<Vec<ResponseRow>, Self::Error>> + Send + '_;

  /// Rewrite a response in place, atomically: replace its body, upsert the
  /// file rows by sha256 (refreshing path/mime/size but preserving the hash
  /// identity), and repopulate the ordered join rows.
  fn rewrite_response<'a>(
    &'a self,
    response_id: i64,
    response_json: &'a str,
    files: &'a [NewFile],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Atomically delete a corrupt response and mark its parent request
  /// `CANCELLED`.
  fn drop_response<'a>(
    &'a self,
    response_id: i64,
    request_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
