//! Content-addressed blob storage on local disk.
//!
//! Blobs live under `<data_dir>/files/<sha256>.<ext>`. A blob is written at
//! most once per content hash; two processes racing to write the same hash
//! produce byte-identical files, so no lock is needed.

use std::fs;
use std::io;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// A blob that has been placed (or found already present) in the store.
#[derive(Debug, Clone)]
pub struct StoredBlob {
  pub sha256:     String,
  /// Path relative to the data directory, e.g. `files/<sha256>.png`.
  pub rel_path:   String,
  pub size_bytes: u64,
}

/// Handle on the on-disk blob store rooted at the data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
  data_dir: PathBuf,
}

impl FileStore {
  pub fn new(data_dir: PathBuf) -> Self {
    Self { data_dir }
  }

  /// Create the `files/` root if it does not exist yet.
  pub fn ensure_root(&self) -> io::Result<()> {
    fs::create_dir_all(self.data_dir.join("files"))
  }

  /// Store `bytes` under their content hash. Skips the write when a file
  /// with that content already exists, which makes re-runs idempotent.
  pub fn store(&self, bytes: &[u8], mime_type: &str) -> io::Result<StoredBlob> {
    let sha256 = hex::encode(Sha256::digest(bytes));
    let ext = ext_from_mime(mime_type);
    let rel_path = format!("files/{sha256}.{ext}");
    let abs = self.data_dir.join(&rel_path);

    if !abs.exists() {
      if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::write(&abs, bytes)?;
    }

    Ok(StoredBlob {
      sha256,
      rel_path,
      size_bytes: bytes.len() as u64,
    })
  }
}

/// File extension for a declared mime type. Known image types get proper
/// extensions; anything else falls back to a generic binary extension.
pub fn ext_from_mime(mime: &str) -> &'static str {
  match mime.trim().to_ascii_lowercase().as_str() {
    "image/png" => "png",
    "image/jpeg" | "image/jpg" => "jpg",
    "image/webp" => "webp",
    "image/gif" => "gif",
    _ => "bin",
  }
}
