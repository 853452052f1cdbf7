//! File-backed correlation state, one table per session.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hl_core::{CorrelationState, SessionId, StateStorage};

use crate::error::StoreError;
use crate::fs_util::{lock_exclusive, write_atomic};
use crate::paths;

/// A session's correlation table, locked for the lifetime of this value.
///
/// Opening takes an exclusive lock on the session's lock file, so one
/// `load`/`save` cycle forms a single critical section across concurrent
/// invocations. Dropping the value releases the lock.
#[derive(Debug)]
pub struct FileStateStorage {
    state_path: PathBuf,
    _lock: File,
}

impl FileStateStorage {
    /// Opens and locks the correlation table of `session_id` under `log_dir`.
    pub fn open(
        log_dir: &Path,
        session_id: &SessionId,
        lock_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let state_dir = paths::state_dir(log_dir);
        fs::create_dir_all(&state_dir)
            .map_err(|e| StoreError::io("creating state directory", &state_dir, e))?;

        let lock_path = paths::state_lock_path(log_dir, session_id);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::io("opening lock file", &lock_path, e))?;
        lock_exclusive(&lock, &lock_path, lock_timeout)?;

        Ok(Self {
            state_path: paths::state_path(log_dir, session_id),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.state_path
    }
}

impl StateStorage for FileStateStorage {
    type Error = StoreError;

    fn load(&mut self) -> Result<CorrelationState, StoreError> {
        let content = match fs::read_to_string(&self.state_path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CorrelationState::default()),
            Err(e) => return Err(StoreError::io("reading correlation state", &self.state_path, e)),
        };
        serde_json::from_str(&content).map_err(|e| StoreError::json_parse(&self.state_path, e))
    }

    fn save(&mut self, state: &CorrelationState) -> Result<(), StoreError> {
        let json = serde_json::to_vec(state)
            .map_err(|e| StoreError::json_serialize(&self.state_path, e))?;
        write_atomic(&self.state_path, &json)
    }
}
