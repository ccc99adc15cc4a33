//! Error type for `cueme-engine`, generic over the store backend's error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error<E: std::error::Error + 'static> {
  /// Storage faults are fatal and propagate unmodified; there is no retry
  /// at this layer.
  #[error("store error: {0}")]
  Store(#[source] E),

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// Legacy data present and not yet migrated; a user-actionable refusal,
  /// not a crash.
  #[error(
    "database schema is outdated (pre-file storage); run `cueme migrate` first"
  )]
  SchemaOutdated,
}

pub type Result<T, E> = std::result::Result<T, Error<E>>;
