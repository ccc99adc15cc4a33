//! The Migration Engine: one-shot, idempotent move from inline base64
//! attachments to content-addressed file references.
//!
//! Each response row is rewritten inside its own store transaction, so a
//! failure partway through leaves every other row intact and a re-run picks
//! up where things stood. The schema version flag is flipped globally only
//! at the very end; until then the gate keeps normal operation out.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cueme_core::{CueStore, NewFile, ResponseBody};

use crate::{Engine, Error, FileStore, SCHEMA_VERSION_CURRENT};

/// What a migration run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
  pub total:           usize,
  pub migrated:        usize,
  pub deleted:         usize,
  /// True when the store already read the target version and nothing ran.
  pub already_current: bool,
}

impl MigrationReport {
  pub fn message(&self) -> String {
    if self.already_current {
      format!("Already migrated (schema_version={SCHEMA_VERSION_CURRENT}).")
    } else {
      format!(
        "Migrate completed. total={} migrated={} deleted={}",
        self.total, self.migrated, self.deleted
      )
    }
  }
}

impl<S: CueStore> Engine<S> {
  /// Run the migration. Safe to invoke any number of times: a store already
  /// at the target version returns immediately, and a row already in the
  /// new shape is skipped without touching it.
  pub async fn migrate(&self) -> Result<MigrationReport, Error<S::Error>> {
    let file_store = FileStore::new(self.config.data_dir.clone());
    file_store.ensure_root()?;

    let version = self.store.schema_version().await.map_err(Error::Store)?;
    if version.as_deref() == Some(SCHEMA_VERSION_CURRENT) {
      return Ok(MigrationReport {
        total:           0,
        migrated:        0,
        deleted:         0,
        already_current: true,
      });
    }

    let rows = self.store.list_responses().await.map_err(Error::Store)?;
    let total = rows.len();
    let mut migrated = 0usize;
    let mut deleted = 0usize;

    for (processed, row) in rows.into_iter().enumerate() {
      let body = ResponseBody::parse(&row.response_json);

      match &body {
        // Already in the new shape: the row and its attachment links stay
        // untouched, so a resumed run cannot disturb earlier work.
        ResponseBody::Current { .. } => {}
        // Corrupt record: no recoverable content. Delete the response and
        // cancel its request; the data loss is accepted.
        ResponseBody::Unparseable => {
          self
            .store
            .drop_response(row.id, &row.request_id)
            .await
            .map_err(Error::Store)?;
          deleted += 1;
        }
        ResponseBody::Legacy { images, .. } => {
          match collect_attachments(&file_store, images)? {
            Some(files) => {
              let json = body.normalized_json().to_string();
              self
                .store
                .rewrite_response(row.id, &json, &files)
                .await
                .map_err(Error::Store)?;
              migrated += 1;
            }
            None => {
              self
                .store
                .drop_response(row.id, &row.request_id)
                .await
                .map_err(Error::Store)?;
              deleted += 1;
            }
          }
        }
      }

      let processed = processed + 1;
      if processed % 50 == 0 || processed == total {
        tracing::info!(processed, total, migrated, deleted, "migrate progress");
      }
    }

    // The commit point: only now does normal operation unlock.
    self
      .store
      .set_schema_version(SCHEMA_VERSION_CURRENT)
      .await
      .map_err(Error::Store)?;

    Ok(MigrationReport {
      total,
      migrated,
      deleted,
      already_current: false,
    })
  }
}

/// Decode and store every inline attachment. Returns `None` when any
/// attachment is undecodable or empty — the whole row is then treated as
/// corrupt, matching the unparseable-body case.
fn collect_attachments<E: std::error::Error + 'static>(
  file_store: &FileStore,
  images: &[cueme_core::InlineImage],
) -> Result<Option<Vec<NewFile>>, Error<E>> {
  let mut files = Vec::with_capacity(images.len());

  for image in images {
    let Ok(bytes) = BASE64.decode(image.base64_data.as_bytes()) else {
      return Ok(None);
    };
    if bytes.is_empty() {
      return Ok(None);
    }

    let blob = file_store.store(&bytes, &image.mime_type)?;
    let mime_type = if image.mime_type.is_empty() {
      "application/octet-stream".to_owned()
    } else {
      image.mime_type.clone()
    };

    files.push(NewFile {
      sha256: blob.sha256,
      file: blob.rel_path,
      mime_type,
      size_bytes: blob.size_bytes,
    });
  }

  Ok(Some(files))
}
