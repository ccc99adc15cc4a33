//! The Rendezvous Engine: post a request, poll for the response, apply
//! timeout policy, render the outcome.
//!
//! The wait is a cooperative read → sleep → read loop. Nothing is cached
//! between polls (every iteration is a fresh store read), and no lock is
//! held while sleeping, so the human-facing responder and concurrent waits
//! for other requests proceed freely.

use std::time::Duration;

use cueme_core::{
  CueStore, NewRequest, RequestStatus, ResponseBody, WaitMode,
  content::{self, CUE_TODO_CONSTRAINT_TEXT, ContentBlock},
  response::FileRef,
};
use rand_core::{OsRng, RngCore};
use tokio::time::Instant;

use crate::{Engine, Error, names};

/// Body written when a cue deadline synthesizes a cancellation.
const EMPTY_RESPONSE_JSON: &str = r#"{"text":""}"#;

const DEFAULT_PAUSE_PROMPT: &str = "Paused. Click Continue when you are ready.";

/// UI affordance hint attached to pause requests.
const PAUSE_PAYLOAD: &str = r#"{"type":"confirm","variant":"pause","text":"Paused. Click Continue when you are ready.","confirm_label":"Continue","cancel_label":""}"#;

// ─── Results ─────────────────────────────────────────────────────────────────

/// A freshly allocated (or recalled) agent identity plus the instructions
/// the agent should keep.
#[derive(Debug, Clone)]
pub struct Identity {
  pub agent_id: String,
  pub message:  String,
}

/// The decoded answer carried by a finished wait.
#[derive(Debug, Clone, Default)]
pub struct UserResponse {
  pub text:  String,
  pub files: Vec<FileRef>,
}

/// The full outcome of a cue or pause.
#[derive(Debug, Clone)]
pub struct CueOutcome {
  pub request_id:      String,
  /// True for explicit cancellations and timeouts; never for an empty
  /// answer.
  pub cancelled:       bool,
  pub response:        UserResponse,
  pub contents:        Vec<ContentBlock>,
  pub constraint_text: Option<String>,
}

/// A fresh `req_<12 hex>` token: 48 bits of OS entropy, enough that
/// collisions are negligible.
fn new_request_id() -> String {
  let mut bytes = [0u8; 6];
  OsRng.fill_bytes(&mut bytes);
  format!("req_{}", hex::encode(bytes))
}

fn normalize_agent_runtime(raw: Option<&str>) -> String {
  let parts: Vec<&str> = raw
    .unwrap_or_default()
    .trim()
    .split(|c: char| c.is_whitespace() || c == '-')
    .filter(|part| !part.is_empty())
    .collect();
  if parts.is_empty() {
    "unknown".to_owned()
  } else {
    parts.join("_").to_lowercase()
  }
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S: CueStore> Engine<S> {
  /// Allocate a fresh agent identity. Touches nothing in the store and is
  /// not schema-gated.
  pub fn join(&self, agent_runtime: Option<&str>) -> Identity {
    let agent_id = names::generate();
    let project_dir = std::env::current_dir()
      .map(|p| p.display().to_string())
      .unwrap_or_default();
    let runtime = normalize_agent_runtime(agent_runtime);

    let message = format!(
      "agent_id={agent_id}\nproject_dir={project_dir}\nagent_runtime={runtime}\n\n\
Use this agent_id when calling cue(prompt, agent_id). You must remember this \
agent_id: when calling cue(), pass it as agent_id so the system knows who \
you are. Before ending this session, call cue. Please use cue to provide a \
final summary, ask a question, or make a request."
    );
    Identity { agent_id, message }
  }

  /// Best-effort identity recovery: the most recent non-empty agent whose
  /// prompt contains `hints`, else a brand-new name. Prompts are shared
  /// text, so this can return the wrong agent; that is accepted.
  pub async fn recall(&self, hints: &str) -> Result<Identity, Error<S::Error>> {
    self.ensure_schema_current().await?;

    if let Some(agent_id) = self
      .store
      .latest_agent_for_prompt(hints)
      .await
      .map_err(Error::Store)?
    {
      let message = format!(
        "agent_id={agent_id}\n\nUse this agent_id when calling cue(prompt, agent_id)."
      );
      return Ok(Identity { agent_id, message });
    }

    let agent_id = names::generate();
    let message = format!(
      "No matching record found; generated a new agent_id.\n\n\
agent_id={agent_id}\n\n\
Use this agent_id when calling cue(prompt, agent_id)."
    );
    Ok(Identity { agent_id, message })
  }

  /// Bounded wait. An unspecified timeout takes the configured default.
  pub async fn cue(
    &self,
    agent_id: &str,
    prompt: &str,
    payload: Option<String>,
    timeout: Option<Duration>,
  ) -> Result<CueOutcome, Error<S::Error>> {
    // The payload is stored verbatim for the responder UI; reject anything
    // that is not well-formed JSON before touching the store at all.
    if let Some(payload) = &payload {
      serde_json::from_str::<serde_json::Value>(payload)?;
    }
    self.ensure_schema_current().await?;
    let timeout = timeout.unwrap_or(self.config.default_timeout);
    self
      .await_response(WaitMode::Cue, agent_id, prompt, payload, Some(timeout))
      .await
  }

  /// Unbounded wait: suspend until an external resume writes a response.
  /// Pause never synthesizes a cancellation on its own.
  pub async fn pause(
    &self,
    agent_id: &str,
    prompt: Option<&str>,
  ) -> Result<CueOutcome, Error<S::Error>> {
    self.ensure_schema_current().await?;
    let prompt = prompt.unwrap_or(DEFAULT_PAUSE_PROMPT);
    self
      .await_response(
        WaitMode::Pause,
        agent_id,
        prompt,
        Some(PAUSE_PAYLOAD.to_owned()),
        None,
      )
      .await
  }

  async fn await_response(
    &self,
    mode: WaitMode,
    agent_id: &str,
    prompt: &str,
    payload: Option<String>,
    timeout: Option<Duration>,
  ) -> Result<CueOutcome, Error<S::Error>> {
    let request_id = new_request_id();

    // The insert must succeed before any waiting begins; a failure here is
    // a storage fault, not a protocol outcome.
    self
      .store
      .insert_request(NewRequest {
        request_id: request_id.clone(),
        agent_id:   agent_id.to_owned(),
        prompt:     prompt.to_owned(),
        payload,
      })
      .await
      .map_err(Error::Store)?;

    tracing::debug!(%request_id, ?timeout, "waiting for response");
    let deadline = timeout.map(|t| Instant::now() + t);

    // Poll before checking the deadline: a response that landed during the
    // final interval still wins.
    let row = loop {
      if let Some(row) = self
        .store
        .find_response(&request_id)
        .await
        .map_err(Error::Store)?
      {
        break Some(row);
      }
      if let Some(deadline) = deadline
        && Instant::now() >= deadline
      {
        break None;
      }
      tokio::time::sleep(self.config.poll_interval).await;
    };

    let Some(row) = row else {
      return self.timed_out(mode, request_id).await;
    };

    if row.cancelled {
      return Ok(CueOutcome {
        request_id,
        cancelled: true,
        response: UserResponse::default(),
        contents: content::cancelled_contents(mode),
        constraint_text: None,
      });
    }

    // Malformed bodies degrade to an empty answer; the poll loop never
    // crashes on content.
    let body = ResponseBody::parse(&row.response_json);
    let text = body.text().to_owned();
    let files = self
      .store
      .files_for_response(row.id)
      .await
      .map_err(Error::Store)?;

    if text.trim().is_empty() && files.is_empty() {
      // An empty answer still satisfies a cue; a pause resumed with
      // nothing is a plain continue signal and leaves the request alone.
      if mode == WaitMode::Cue {
        self
          .store
          .set_request_status(&request_id, RequestStatus::Completed)
          .await
          .map_err(Error::Store)?;
      }
      return Ok(CueOutcome {
        request_id,
        cancelled: false,
        response: UserResponse { text, files },
        contents: content::empty_contents(mode),
        constraint_text: None,
      });
    }

    let contents = content::answered_contents(&text, &files, &self.config.data_dir);
    Ok(CueOutcome {
      request_id,
      cancelled: false,
      response: UserResponse { text, files },
      contents,
      constraint_text: Some(CUE_TODO_CONSTRAINT_TEXT.to_owned()),
    })
  }

  /// Deadline elapsed: cancel the request and conditionally insert the
  /// synthetic empty response. The conditional insert rides the UNIQUE
  /// constraint, so a genuine response committing in the same instant is
  /// kept and the synthetic one is discarded.
  async fn timed_out(
    &self,
    mode: WaitMode,
    request_id: String,
  ) -> Result<CueOutcome, Error<S::Error>> {
    self
      .store
      .set_request_status(&request_id, RequestStatus::Cancelled)
      .await
      .map_err(Error::Store)?;

    let inserted = self
      .store
      .insert_response_if_absent(&request_id, EMPTY_RESPONSE_JSON, true)
      .await
      .map_err(Error::Store)?;
    if inserted {
      tracing::debug!(%request_id, "synthesized cancellation response");
    } else {
      tracing::debug!(%request_id, "a genuine response won the timeout race");
    }

    Ok(CueOutcome {
      request_id,
      cancelled: true,
      response: UserResponse::default(),
      contents: content::timeout_contents(mode),
      constraint_text: None,
    })
  }
}
