//! Engine tests against an in-memory SQLite store, with a spawned task
//! standing in for the human-facing responder.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cueme_core::{CueStore, NewRequest, RequestStatus};
use cueme_store_sqlite::SqliteStore;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::{Engine, EngineConfig, Error};

async fn engine() -> (Engine<SqliteStore>, SqliteStore, TempDir) {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  let dir = tempfile::tempdir().expect("tempdir");
  let mut config = EngineConfig::new(dir.path().to_path_buf());
  config.poll_interval = Duration::from_millis(10);
  (Engine::new(store.clone(), config), store, dir)
}

/// Answer the first request that shows up, the way the human-facing channel
/// would.
fn respond_when_pending(
  store: SqliteStore,
  json: &'static str,
  cancelled: bool,
) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    loop {
      let pending = store.pending_requests().await.expect("pending");
      if let Some(request) = pending.first() {
        store
          .insert_response_if_absent(&request.request_id, json, cancelled)
          .await
          .expect("insert response");
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
  })
}

fn request(request_id: &str, agent_id: &str, prompt: &str) -> NewRequest {
  NewRequest {
    request_id: request_id.into(),
    agent_id:   agent_id.into(),
    prompt:     prompt.into(),
    payload:    None,
  }
}

const FIVE_SECONDS: Option<Duration> = Some(Duration::from_secs(5));

// ─── Cue outcomes ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cue_answered_keeps_request_pending() {
  let (engine, store, _dir) = engine().await;
  let responder = respond_when_pending(store.clone(), r#"{"text":"ship it"}"#, false);

  let outcome = engine
    .cue("quiet-otter-11", "deploy?", None, FIVE_SECONDS)
    .await
    .unwrap();
  responder.await.unwrap();

  assert!(!outcome.cancelled);
  assert_eq!(outcome.response.text, "ship it");
  assert!(outcome.contents[0].as_text().contains("ship it"));
  assert!(outcome.constraint_text.is_some());

  // Observed asymmetry: a non-empty answer does not complete the request.
  let req = store.find_request(&outcome.request_id).await.unwrap().unwrap();
  assert_eq!(req.status, RequestStatus::Pending);
}

#[tokio::test]
async fn cue_empty_answer_completes_request() {
  let (engine, store, _dir) = engine().await;
  let responder = respond_when_pending(store.clone(), r#"{"text":""}"#, false);

  let outcome = engine.cue("a", "anything?", None, FIVE_SECONDS).await.unwrap();
  responder.await.unwrap();

  assert!(!outcome.cancelled);
  assert!(outcome.contents[0].as_text().contains("No user input received"));
  assert!(outcome.constraint_text.is_none());

  let req = store.find_request(&outcome.request_id).await.unwrap().unwrap();
  assert_eq!(req.status, RequestStatus::Completed);
}

#[tokio::test]
async fn cue_cancelled_response_is_not_empty() {
  let (engine, store, _dir) = engine().await;
  let responder = respond_when_pending(store.clone(), r#"{"text":""}"#, true);

  let outcome = engine.cue("a", "go on?", None, FIVE_SECONDS).await.unwrap();
  responder.await.unwrap();

  // Same blank text as an empty answer, but never conflated with it.
  assert!(outcome.cancelled);
  assert!(outcome.contents[0].as_text().contains("did not continue"));

  let req = store.find_request(&outcome.request_id).await.unwrap().unwrap();
  assert_eq!(req.status, RequestStatus::Pending);
}

#[tokio::test]
async fn cue_timeout_cancels_and_synthesizes_response() {
  let (engine, store, _dir) = engine().await;

  let outcome = engine
    .cue("a", "anyone there?", None, Some(Duration::ZERO))
    .await
    .unwrap();

  assert!(outcome.cancelled);
  assert!(outcome.contents[0].as_text().contains("Timed out"));

  let req = store.find_request(&outcome.request_id).await.unwrap().unwrap();
  assert_eq!(req.status, RequestStatus::Cancelled);

  let row = store.find_response(&outcome.request_id).await.unwrap().unwrap();
  assert!(row.cancelled);
  assert_eq!(row.response_json, r#"{"text":""}"#);

  // The synthetic row occupies the unique slot; nothing else can land.
  let inserted = store
    .insert_response_if_absent(&outcome.request_id, r#"{"text":"late"}"#, false)
    .await
    .unwrap();
  assert!(!inserted);
}

#[tokio::test]
async fn cue_malformed_body_degrades_to_empty() {
  let (engine, store, _dir) = engine().await;
  let responder = respond_when_pending(store.clone(), "certainly not json", false);

  let outcome = engine.cue("a", "p", None, FIVE_SECONDS).await.unwrap();
  responder.await.unwrap();

  assert!(!outcome.cancelled);
  assert_eq!(outcome.response.text, "");
  assert!(outcome.contents[0].as_text().contains("No user input received"));
}

#[tokio::test]
async fn cue_rejects_malformed_payload_before_touching_store() {
  let (engine, store, _dir) = engine().await;

  let err = engine
    .cue("a", "p", Some("{not json".to_owned()), FIVE_SECONDS)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Json(_)));

  // The rejection happens ahead of the schema gate: a fresh store is left
  // unstamped and holds no request row.
  assert!(store.schema_version().await.unwrap().is_none());
  assert!(store.pending_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn cue_unspecified_timeout_takes_configured_default() {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  let dir = tempfile::tempdir().expect("tempdir");
  let mut config = EngineConfig::new(dir.path().to_path_buf());
  config.poll_interval = Duration::from_millis(10);
  config.default_timeout = Duration::ZERO;
  let engine = Engine::new(store, config);

  let outcome = engine.cue("a", "p", None, None).await.unwrap();
  assert!(outcome.cancelled);
  assert!(outcome.contents[0].as_text().contains("Timed out"));
}

#[tokio::test]
async fn pause_empty_resume_leaves_request_pending() {
  let (engine, store, _dir) = engine().await;
  let responder = respond_when_pending(store.clone(), r#"{"text":""}"#, false);

  let outcome = engine.pause("a", None).await.unwrap();
  responder.await.unwrap();

  assert!(!outcome.cancelled);
  assert!(outcome.contents[0].as_text().contains("resumed the conversation"));

  let req = store.find_request(&outcome.request_id).await.unwrap().unwrap();
  assert_eq!(req.status, RequestStatus::Pending);
  assert_eq!(req.prompt, "Paused. Click Continue when you are ready.");
  assert!(req.payload.is_some());
}

// ─── Schema gate ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn gate_blocks_legacy_store() {
  let (engine, store, _dir) = engine().await;
  // Rows exist but no version marker: a pre-migration database.
  store.insert_request(request("req_old", "a", "old")).await.unwrap();

  let err = engine.cue("a", "p", None, FIVE_SECONDS).await.unwrap_err();
  assert!(matches!(err, Error::SchemaOutdated));

  let err = engine.recall("old").await.unwrap_err();
  assert!(matches!(err, Error::SchemaOutdated));
}

#[tokio::test]
async fn gate_stamps_fresh_store() {
  let (engine, store, _dir) = engine().await;

  engine.recall("anything").await.unwrap();
  assert_eq!(store.schema_version().await.unwrap().as_deref(), Some("2"));
}

// ─── Join / recall ───────────────────────────────────────────────────────────

#[tokio::test]
async fn join_reports_identity_and_runtime() {
  let (engine, _store, _dir) = engine().await;

  let identity = engine.join(Some("Claude Code"));
  assert!(!identity.agent_id.is_empty());
  assert!(identity.message.contains(&format!("agent_id={}", identity.agent_id)));
  assert!(identity.message.contains("agent_runtime=claude_code"));
}

#[tokio::test]
async fn recall_finds_most_recent_matching_agent() {
  let (engine, store, _dir) = engine().await;
  store.set_schema_version("2").await.unwrap();
  store
    .insert_request(request("req_1", "warm-wren-07", "refactor the parser"))
    .await
    .unwrap();

  let identity = engine.recall("refactor the parser").await.unwrap();
  assert_eq!(identity.agent_id, "warm-wren-07");
}

#[tokio::test]
async fn recall_falls_back_to_new_identity() {
  let (engine, _store, _dir) = engine().await;

  let identity = engine.recall("xyz123").await.unwrap();
  assert!(!identity.agent_id.is_empty());
  assert!(identity.message.contains("No matching record found"));
}

// ─── Migration ───────────────────────────────────────────────────────────────

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

fn legacy_png_body() -> String {
  format!(
    r#"{{"text":"","images":[{{"mime_type":"image/png","base64_data":"{}"}}]}}"#,
    BASE64.encode(PNG_BYTES)
  )
}

async fn legacy_store_with(
  store: &SqliteStore,
  request_id: &str,
  body: &str,
) -> i64 {
  store
    .insert_request(request(request_id, "a", "look at this"))
    .await
    .unwrap();
  store
    .insert_response_if_absent(request_id, body, false)
    .await
    .unwrap();
  store.find_response(request_id).await.unwrap().unwrap().id
}

#[tokio::test]
async fn migrate_round_trips_a_legacy_attachment() {
  let (engine, store, dir) = engine().await;
  let body = legacy_png_body();
  let response_id = legacy_store_with(&store, "req_1", &body).await;

  let report = engine.migrate().await.unwrap();
  assert!(!report.already_current);
  assert_eq!((report.total, report.migrated, report.deleted), (1, 1, 0));

  let row = store.find_response("req_1").await.unwrap().unwrap();
  assert_eq!(row.response_json, r#"{"text":""}"#);

  let sha = hex::encode(Sha256::digest(PNG_BYTES));
  let files = store.files_for_response(response_id).await.unwrap();
  assert_eq!(files.len(), 1);
  assert_eq!(files[0].file, format!("files/{sha}.png"));
  assert_eq!(files[0].mime_type, "image/png");

  let on_disk = std::fs::read(dir.path().join(&files[0].file)).unwrap();
  assert_eq!(on_disk, PNG_BYTES);

  assert_eq!(store.schema_version().await.unwrap().as_deref(), Some("2"));
}

#[tokio::test]
async fn migrate_twice_is_a_noop() {
  let (engine, store, _dir) = engine().await;
  let body = legacy_png_body();
  let response_id = legacy_store_with(&store, "req_1", &body).await;

  engine.migrate().await.unwrap();
  let first_json = store.find_response("req_1").await.unwrap().unwrap().response_json;
  let first_files = store.files_for_response(response_id).await.unwrap();

  let report = engine.migrate().await.unwrap();
  assert!(report.already_current);
  assert_eq!((report.migrated, report.deleted), (0, 0));

  let row = store.find_response("req_1").await.unwrap().unwrap();
  assert_eq!(row.response_json, first_json);
  assert_eq!(store.files_for_response(response_id).await.unwrap(), first_files);
}

#[tokio::test]
async fn migrate_resumed_run_leaves_current_rows_untouched() {
  let (engine, store, _dir) = engine().await;
  let body = legacy_png_body();
  let response_id = legacy_store_with(&store, "req_1", &body).await;

  engine.migrate().await.unwrap();
  let files = store.files_for_response(response_id).await.unwrap();
  assert_eq!(files.len(), 1);

  // A crash before the commit point leaves the version marker behind while
  // some rows are already in the new shape; the re-run must not strip
  // their attachment links.
  store.set_schema_version("1").await.unwrap();
  let report = engine.migrate().await.unwrap();
  assert!(!report.already_current);
  assert_eq!((report.total, report.migrated, report.deleted), (1, 0, 0));

  assert_eq!(store.files_for_response(response_id).await.unwrap(), files);
  let row = store.find_response("req_1").await.unwrap().unwrap();
  assert_eq!(row.response_json, r#"{"text":""}"#);
  assert_eq!(store.schema_version().await.unwrap().as_deref(), Some("2"));
}

#[tokio::test]
async fn migrate_dedups_identical_bytes() {
  let (engine, store, _dir) = engine().await;
  let body = legacy_png_body();
  let first = legacy_store_with(&store, "req_1", &body).await;
  let second = legacy_store_with(&store, "req_2", &body).await;

  let report = engine.migrate().await.unwrap();
  assert_eq!(report.migrated, 2);

  // Two join rows, one content identity.
  let f1 = store.files_for_response(first).await.unwrap();
  let f2 = store.files_for_response(second).await.unwrap();
  assert_eq!(f1.len(), 1);
  assert_eq!(f1, f2);
}

#[tokio::test]
async fn migrate_deletes_corrupt_rows_and_cancels_requests() {
  let (engine, store, _dir) = engine().await;
  legacy_store_with(&store, "req_bad", "not json").await;

  let report = engine.migrate().await.unwrap();
  assert_eq!((report.total, report.migrated, report.deleted), (1, 0, 1));

  assert!(store.find_response("req_bad").await.unwrap().is_none());
  let req = store.find_request("req_bad").await.unwrap().unwrap();
  assert_eq!(req.status, RequestStatus::Cancelled);
}

#[tokio::test]
async fn migrate_treats_bad_base64_as_corrupt() {
  let (engine, store, _dir) = engine().await;
  let body = r#"{"text":"","images":[{"mime_type":"image/png","base64_data":"%%%"}]}"#;
  legacy_store_with(&store, "req_bad", body).await;

  let report = engine.migrate().await.unwrap();
  assert_eq!(report.deleted, 1);
  assert!(store.find_response("req_bad").await.unwrap().is_none());
}

#[tokio::test]
async fn migrate_treats_empty_attachment_as_corrupt() {
  let (engine, store, _dir) = engine().await;
  let body = r#"{"text":"","images":[{"mime_type":"image/png","base64_data":""}]}"#;
  legacy_store_with(&store, "req_bad", body).await;

  let report = engine.migrate().await.unwrap();
  assert_eq!(report.deleted, 1);
}

#[tokio::test]
async fn migrate_preserves_text_and_mentions() {
  let (engine, store, _dir) = engine().await;
  let body = format!(
    r#"{{"text":"keep me","mentions":["@reviewer"],"images":[{{"mime_type":"image/gif","base64_data":"{}"}}]}}"#,
    BASE64.encode(b"gifdata")
  );
  legacy_store_with(&store, "req_1", &body).await;

  engine.migrate().await.unwrap();

  let row = store.find_response("req_1").await.unwrap().unwrap();
  let value: serde_json::Value = serde_json::from_str(&row.response_json).unwrap();
  assert_eq!(value["text"], "keep me");
  assert_eq!(value["mentions"][0], "@reviewer");
  assert!(value.get("images").is_none());
}
