//! Bounded-wait file locking and atomic file replacement.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::StoreError;

/// Pause between lock attempts.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Takes an exclusive advisory lock on `file`, giving up after `timeout`.
///
/// The lock is released when `file` is closed.
pub fn lock_exclusive(file: &File, path: &Path, timeout: Duration) -> Result<(), StoreError> {
    let deadline = Instant::now() + timeout;
    let contended = fs2::lock_contended_error().raw_os_error();

    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.raw_os_error() == contended => {}
            Err(e) => return Err(StoreError::io("locking", path, e)),
        }

        if Instant::now() >= deadline {
            return Err(StoreError::LockTimeout {
                path: path.to_path_buf(),
                timeout,
            });
        }
        thread::sleep(LOCK_POLL_INTERVAL);
    }
}

/// Returns a unique sibling path for staging a replacement of `path`.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

/// Replaces `path` with `contents` so readers see either the old or the new
/// file, never a partial one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let tmp_path = temp_sibling(path);

    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::io("replacing file", path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_atomic_reports_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("state.json");
        let err = write_atomic(&path, b"x").unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn temp_sibling_is_hidden_and_unique() {
        let path = Path::new("/logs/latest.jsonl");
        let a = temp_sibling(path);
        let b = temp_sibling(path);
        assert_ne!(a, b);
        assert_eq!(a.parent(), path.parent());
        assert!(a.file_name().unwrap().to_string_lossy().starts_with(".latest.jsonl."));
    }

    #[test]
    fn lock_times_out_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("held.lock");
        let holder = File::create(&path).unwrap();
        lock_exclusive(&holder, &path, Duration::from_millis(100)).unwrap();

        let contender = File::create(&path).unwrap();
        let err = lock_exclusive(&contender, &path, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));

        drop(holder);
        lock_exclusive(&contender, &path, Duration::from_millis(100)).unwrap();
    }
}
