//! Storage layer for the hook logger.
//!
//! Everything the logger persists lives under one log directory:
//! append-only session logs, the latest-session marker, and one correlation
//! table per session. See [`paths`] for the layout.
//!
//! # Concurrency
//!
//! Hook invocations are independent processes that may overlap. Appends take
//! an exclusive advisory lock on the session log; correlation tables are
//! guarded by a per-session lock file held across load and save. Lock waits
//! are bounded so a stuck peer cannot stall the host.

mod correlation;
mod error;
mod fs_util;
pub mod paths;
mod session_log;

pub use correlation::FileStateStorage;
pub use error::StoreError;
pub use session_log::SessionLog;
