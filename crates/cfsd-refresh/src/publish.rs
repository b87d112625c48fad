//! Snapshot publishing.
//!
//! The artifact is written to a uniquely named temporary file next to the
//! target, synced, renamed over the target, and the directory is synced.
//! Readers see either the previous snapshot or the new one, never a
//! partial write, and a crash after the rename cannot leave an empty file.
//! A temporary file is removed if any step fails.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use cfsd_core::Snapshot;

use crate::error::{PublishError, PublishResult};

/// Writes snapshots to a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize and replace the artifact. Returns the number of bytes written.
    pub async fn write(&self, snapshot: &Snapshot) -> PublishResult<usize> {
        let body = snapshot.to_json_pretty()?;
        let path = self.path.clone();

        let bytes = tokio::task::spawn_blocking(move || write_atomically(&path, &body)).await??;

        debug!(path = %self.path.display(), bytes, "snapshot written");
        Ok(bytes)
    }
}

/// Blocking write-sync-rename of `body` to `path`.
fn write_atomically(path: &Path, body: &[u8]) -> PublishResult<usize> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "targets.json".to_string());
    let write_err = |source| PublishError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Dropping `tmp` on any error below removes the file.
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;

    tmp.write_all(body).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(write_err)?;

    Ok(body.len())
}
