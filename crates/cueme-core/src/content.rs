//! Rendering of wait outcomes into agent-consumable content blocks.
//!
//! These are pure functions over the decoded response; the engine picks the
//! set matching the outcome. Attachments are rendered as readable paths, not
//! inline bytes — the agent is instructed to read the files itself.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::request::WaitMode;
use crate::response::FileRef;

/// One block of the rendered outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
  Text { text: String },
}

impl ContentBlock {
  pub fn text(text: impl Into<String>) -> Self {
    Self::Text { text: text.into() }
  }

  pub fn as_text(&self) -> &str {
    match self {
      Self::Text { text } => text,
    }
  }
}

/// The fixed policy reminder appended after answered and empty outcomes. It
/// keeps the agent inside the cue-before-ending-turn protocol.
pub const CUE_TODO_CONSTRAINT_TEXT: &str = "IMPORTANT — Human Agent Protocol: before completing any user instruction or \
answering a question, you must cue the human (call cue(prompt, agent_id, \
payload?) and let them continue). Do not end your reply before an actual cue \
call has been made.\n\n\
IMPORTANT — todo_list check: before executing this user instruction, check \
the current todo_list and make sure its last entry is 'send the likely \
response to this instruction via cue'. If it is missing, add it immediately.";

/// Blocks for a non-empty answer: leading instruction summary, one path line
/// per attachment, and the policy reminder.
pub fn answered_contents(
  text: &str,
  files: &[FileRef],
  data_dir: &Path,
) -> Vec<ContentBlock> {
  let mut contents = Vec::new();
  let text = text.trim();

  let file_lines: Vec<String> = files
    .iter()
    .filter(|f| !f.file.is_empty())
    .map(|f| {
      let rel = f.file.trim_start_matches('/');
      let path = data_dir.join(rel);
      if f.mime_type.is_empty() {
        format!("- {}", path.display())
      } else {
        format!("- {} ({})", path.display(), f.mime_type)
      }
    })
    .collect();

  if !text.is_empty() {
    contents.push(ContentBlock::text(format!(
      "The user wants to continue and provided the following \
instructions:\n\n{text}"
    )));
  } else if !files.is_empty() {
    contents.push(ContentBlock::text(
      "The user wants to continue and attached files:",
    ));
  }

  if !file_lines.is_empty() {
    contents.push(ContentBlock::text(format!(
      "\n\nAttached file paths below (images and other files alike are plain \
paths). Read these files yourself before continuing:\n{}",
      file_lines.join("\n")
    )));
  }

  contents.push(ContentBlock::text(format!(
    "\n\n{CUE_TODO_CONSTRAINT_TEXT}"
  )));
  contents
}

/// Blocks for a blank answer with no attachments.
pub fn empty_contents(mode: WaitMode) -> Vec<ContentBlock> {
  match mode {
    WaitMode::Pause => vec![ContentBlock::text(format!(
      "The user resumed the conversation.\n\n{CUE_TODO_CONSTRAINT_TEXT}"
    ))],
    WaitMode::Cue => vec![ContentBlock::text(format!(
      "No user input received. Call pause(agent_id) to suspend and wait for \
resume.\n\n{CUE_TODO_CONSTRAINT_TEXT}"
    ))],
  }
}

/// Blocks for a response the human explicitly cancelled.
pub fn cancelled_contents(mode: WaitMode) -> Vec<ContentBlock> {
  match mode {
    WaitMode::Pause => vec![ContentBlock::text(format!(
      "The user did not continue. Call pause(agent_id) to suspend and wait \
for resume.\n\n{CUE_TODO_CONSTRAINT_TEXT}"
    ))],
    WaitMode::Cue => vec![ContentBlock::text(
      "The user did not continue. Call pause(agent_id) to suspend and wait \
for resume.\n\n",
    )],
  }
}

/// Blocks for a wait that hit its deadline. Lighter than the answered
/// reminder: the agent is told to pause, not to keep cueing.
pub fn timeout_contents(mode: WaitMode) -> Vec<ContentBlock> {
  match mode {
    WaitMode::Pause => vec![ContentBlock::text(
      "Tool call was cancelled. Call pause(agent_id) to suspend and wait for \
resume.\n\n",
    )],
    WaitMode::Cue => vec![ContentBlock::text(
      "Timed out waiting for user response. You MUST NOT continue or add any \
extra output. Immediately call pause(agent_id) and stop output until \
resumed.\n\n",
    )],
  }
}
