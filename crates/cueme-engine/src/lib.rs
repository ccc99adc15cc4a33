//! The cueme engines: rendezvous (cue/pause/join/recall) and migration.
//!
//! Both operate through the [`CueStore`] abstraction; the concrete backend
//! is chosen by the caller. Each CLI invocation builds one [`Engine`], runs
//! one operation, and exits — no state outlives the call except what the
//! store persists.

use std::path::PathBuf;
use std::time::Duration;

use cueme_core::CueStore;

mod error;
mod files;
mod migrate;
mod names;
mod rendezvous;

pub use error::Error;
pub use files::FileStore;
pub use migrate::MigrationReport;
pub use rendezvous::{CueOutcome, Identity, UserResponse};

/// The schema version the engines require before normal operation.
pub(crate) const SCHEMA_VERSION_CURRENT: &str = "2";

// ─── Configuration ───────────────────────────────────────────────────────────

/// Tunables for the engines. The defaults match the reference protocol:
/// 500 ms poll interval, 600 s cue timeout.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Root directory holding the database and the `files/` blob store.
  pub data_dir:        PathBuf,
  /// Sleep between response polls.
  pub poll_interval:   Duration,
  /// Cue deadline applied when the caller does not specify one.
  pub default_timeout: Duration,
}

impl EngineConfig {
  pub fn new(data_dir: PathBuf) -> Self {
    Self {
      data_dir,
      poll_interval: Duration::from_millis(500),
      default_timeout: Duration::from_secs(600),
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// One engine instance over a store handle. Cheap to construct; operations
/// are defined in `rendezvous` and `migrate`.
pub struct Engine<S> {
  store:  S,
  config: EngineConfig,
}

impl<S: CueStore> Engine<S> {
  pub fn new(store: S, config: EngineConfig) -> Self {
    Self { store, config }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Check the migration gate: the current version passes; a store with no
  /// rows at all has nothing to migrate and is stamped current on the spot;
  /// anything else refuses until `migrate` has run.
  pub(crate) async fn ensure_schema_current(&self) -> Result<(), Error<S::Error>> {
    let version = self.store.schema_version().await.map_err(Error::Store)?;
    if version.as_deref() == Some(SCHEMA_VERSION_CURRENT) {
      return Ok(());
    }
    if self.store.has_activity().await.map_err(Error::Store)? {
      return Err(Error::SchemaOutdated);
    }
    self
      .store
      .set_schema_version(SCHEMA_VERSION_CURRENT)
      .await
      .map_err(Error::Store)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests;
