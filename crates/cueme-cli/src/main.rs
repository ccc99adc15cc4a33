//! `cueme` — hand control from an agent to a human through a shared local
//! store.
//!
//! # Usage
//!
//! ```
//! cueme join
//! cueme recall --hints "refactor the parser"
//! cueme cue --agent-id "warm-wren-07" --prompt "deploy?" [--timeout 600]
//! cueme pause --agent-id "warm-wren-07"
//! cueme migrate
//! ```
//!
//! Operation output goes to stdout; diagnostics to stderr.

mod stdin;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use cueme_core::content::ContentBlock;
use cueme_engine::{Engine, EngineConfig};
use cueme_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
  name = "cueme",
  about = "Hand control from an agent to a human through a shared local store"
)]
struct Cli {
  /// Data directory holding cue.db and the files/ blob store
  /// (default: ~/.cue).
  #[arg(long, value_name = "DIR")]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Allocate a fresh agent_id and print usage instructions.
  Join {
    /// Name of the agent runtime, recorded in the join message.
    #[arg(long)]
    agent_runtime: Option<String>,
  },

  /// Recover a previously used agent_id by prompt substring.
  Recall {
    /// Substring expected in an earlier prompt.
    #[arg(long)]
    hints: String,
  },

  /// Post a prompt and wait (bounded) for the human's answer.
  Cue {
    #[arg(long, default_value = "")]
    agent_id: String,

    /// Prompt text; read from piped stdin when omitted.
    #[arg(long)]
    prompt: Option<String>,

    /// Optional UI affordance hint, as JSON.
    #[arg(long)]
    payload: Option<String>,

    /// Seconds to wait before giving up (default 600, or the configured
    /// `default_timeout_secs`).
    #[arg(long)]
    timeout: Option<u64>,
  },

  /// Post a prompt and suspend until explicitly resumed.
  Pause {
    #[arg(long, default_value = "")]
    agent_id: String,

    #[arg(long)]
    prompt: Option<String>,
  },

  /// Rewrite legacy inline-base64 responses into the content-addressed
  /// file store.
  Migrate,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file / CUEME_* environment overrides.
#[derive(Deserialize, Default)]
struct FileConfig {
  data_dir:             Option<PathBuf>,
  poll_interval_ms:     Option<u64>,
  default_timeout_secs: Option<u64>,
}

fn load_file_config() -> anyhow::Result<FileConfig> {
  let mut builder = config::Config::builder();
  if let Some(home) = std::env::var_os("HOME") {
    let path = PathBuf::from(home).join(".config/cueme/config.toml");
    builder = builder.add_source(config::File::from(path).required(false));
  }
  let settings = builder
    .add_source(config::Environment::with_prefix("CUEME"))
    .build()
    .context("failed to read configuration")?;
  settings
    .try_deserialize()
    .context("failed to deserialise configuration")
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
  let home = std::env::var_os("HOME").context("HOME is not set")?;
  Ok(PathBuf::from(home).join(".cue"))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let mut command = cli.command;

  // Argument validation happens before any store interaction.
  if let Command::Cue { prompt, .. } = &mut command {
    *prompt = Some(resolve_prompt(prompt.take())?);
  }

  let file_cfg = load_file_config()?;

  // CLI flag overrides config file / environment, which override defaults.
  let data_dir = match cli.data_dir.or(file_cfg.data_dir) {
    Some(dir) => dir,
    None => default_data_dir()?,
  };
  std::fs::create_dir_all(&data_dir)
    .with_context(|| format!("failed to create {}", data_dir.display()))?;
  tracing::debug!(data_dir = %data_dir.display(), "using data directory");

  let mut engine_cfg = EngineConfig::new(data_dir.clone());
  if let Some(ms) = file_cfg.poll_interval_ms {
    engine_cfg.poll_interval = Duration::from_millis(ms);
  }
  if let Some(secs) = file_cfg.default_timeout_secs {
    engine_cfg.default_timeout = Duration::from_secs(secs);
  }

  let store = SqliteStore::open(data_dir.join("cue.db"))
    .await
    .with_context(|| format!("failed to open store in {}", data_dir.display()))?;
  let engine = Engine::new(store, engine_cfg);

  let output = match command {
    Command::Join { agent_runtime } => {
      engine.join(agent_runtime.as_deref()).message
    }
    Command::Recall { hints } => engine.recall(&hints).await?.message,
    Command::Cue { agent_id, prompt, payload, timeout } => {
      let prompt = prompt.unwrap_or_default();
      let outcome = engine
        .cue(&agent_id, &prompt, payload, timeout.map(Duration::from_secs))
        .await?;
      flatten_contents(&outcome.contents)
    }
    Command::Pause { agent_id, prompt } => {
      let outcome = engine.pause(&agent_id, prompt.as_deref()).await?;
      flatten_contents(&outcome.contents)
    }
    Command::Migrate => engine.migrate().await?.message(),
  };

  println!("{output}");
  Ok(())
}

/// A cue prompt comes from the flag or, failing that, from piped stdin.
fn resolve_prompt(flag: Option<String>) -> anyhow::Result<String> {
  if let Some(prompt) = flag
    && !prompt.trim().is_empty()
  {
    return Ok(prompt);
  }
  let piped = stdin::read_all_stdin().context("reading prompt from stdin")?;
  if piped.trim().is_empty() {
    anyhow::bail!("missing required argument: --prompt (or a piped stdin prompt)");
  }
  Ok(piped)
}

/// The text an agent sees: all content blocks joined, in order.
fn flatten_contents(contents: &[ContentBlock]) -> String {
  contents.iter().map(ContentBlock::as_text).collect()
}
