//! Append-only per-session JSONL logs and the latest-session marker.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use hl_core::NormalizedRecord;

use crate::error::StoreError;
use crate::fs_util::{lock_exclusive, temp_sibling};
use crate::paths;

/// Writer for the session logs in one directory.
#[derive(Debug, Clone)]
pub struct SessionLog {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl SessionLog {
    pub fn new(dir: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout,
        }
    }

    /// Appends `record` as one line to its session's log, then points the
    /// latest marker at that log.
    ///
    /// The line goes out in a single write under an exclusive lock, so
    /// concurrent writers never interleave partial lines. A failed marker
    /// update is logged and does not fail the append.
    pub fn append(&self, record: &NormalizedRecord) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::io("creating log directory", &self.dir, e))?;

        let path = paths::session_log_path(&self.dir, &record.session_id);
        let line = record
            .to_json_line()
            .map_err(|e| StoreError::json_serialize(&path, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io("opening session log", &path, e))?;
        lock_exclusive(&file, &path, self.lock_timeout)?;
        file.write_all(line.as_bytes())
            .map_err(|e| StoreError::io("appending record", &path, e))?;
        drop(file);

        tracing::debug!(path = %path.display(), event = %record.event, "appended record");

        let name = paths::session_log_name(&record.session_id);
        if let Err(e) = self.point_latest(&name) {
            tracing::warn!(error = %e, "failed to update latest marker");
        }
        Ok(path)
    }

    /// Atomically repoints the latest marker at `file_name`.
    fn point_latest(&self, file_name: &str) -> Result<(), StoreError> {
        let marker = paths::latest_marker_path(&self.dir);
        let staged = temp_sibling(&marker);

        #[cfg(unix)]
        std::os::unix::fs::symlink(file_name, &staged)
            .map_err(|e| StoreError::io("creating latest marker", &staged, e))?;
        #[cfg(not(unix))]
        fs::write(&staged, file_name)
            .map_err(|e| StoreError::io("creating latest marker", &staged, e))?;

        fs::rename(&staged, &marker).map_err(|e| {
            let _ = fs::remove_file(&staged);
            StoreError::io("replacing latest marker", &marker, e)
        })
    }

    /// Resolves the latest marker to the log file it names.
    pub fn latest(&self) -> Option<PathBuf> {
        let marker = paths::latest_marker_path(&self.dir);

        #[cfg(unix)]
        let target = fs::read_link(&marker).ok()?;
        #[cfg(not(unix))]
        let target = PathBuf::from(fs::read_to_string(&marker).ok()?);

        Some(self.dir.join(target))
    }
}
