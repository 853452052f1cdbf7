//! On-disk layout under the log directory.
//!
//! ```text
//! <log_dir>/
//!   hooks-<session>.jsonl        one record per line
//!   latest.jsonl                 marker for the most recently written session
//!   state/agents-<session>.json  correlation table
//!   state/agents-<session>.lock  advisory lock guarding the table
//! ```

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use hl_core::SessionId;
use regex::{Captures, Regex};

/// Characters that may not appear in a file name derived from a session ID.
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// Name of the latest-session marker.
pub const LATEST_MARKER: &str = "latest.jsonl";

/// Returns the file-name-safe form of a session ID.
///
/// Path separators and other unusual characters are percent-encoded byte by
/// byte, `%` included, so the result always names a file directly inside the
/// log directory and distinct IDs never share a stem.
pub fn session_stem(session_id: &SessionId) -> String {
    UNSAFE_CHARS
        .replace_all(session_id.as_str(), |caps: &Captures<'_>| {
            caps[0].bytes().fold(String::new(), |mut out, b| {
                let _ = write!(out, "%{b:02X}");
                out
            })
        })
        .into_owned()
}

/// File name of a session's log, relative to the log directory.
pub fn session_log_name(session_id: &SessionId) -> String {
    format!("hooks-{}.jsonl", session_stem(session_id))
}

pub fn session_log_path(log_dir: &Path, session_id: &SessionId) -> PathBuf {
    log_dir.join(session_log_name(session_id))
}

pub fn latest_marker_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LATEST_MARKER)
}

pub fn state_dir(log_dir: &Path) -> PathBuf {
    log_dir.join("state")
}

pub fn state_path(log_dir: &Path, session_id: &SessionId) -> PathBuf {
    state_dir(log_dir).join(format!("agents-{}.json", session_stem(session_id)))
}

pub fn state_lock_path(log_dir: &Path, session_id: &SessionId) -> PathBuf {
    state_dir(log_dir).join(format!("agents-{}.lock", session_stem(session_id)))
}
