//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use hl_core::ProjectOptions;
use hl_core::projection::DEFAULT_RESPONSE_MAX_CHARS;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding session logs. Defaults to `<project_dir>/hooks/logs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Project root of the observed session; taken from `CLAUDE_PROJECT_DIR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,

    /// Longest assistant or subagent text kept per record, in characters.
    pub response_max_chars: usize,

    /// Subagent entries kept per session before the oldest are dropped.
    pub max_tracked_agents: usize,

    /// Longest wait for a file lock before giving up.
    pub lock_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: None,
            project_dir: None,
            response_max_chars: DEFAULT_RESPONSE_MAX_CHARS,
            max_tracked_agents: 100,
            lock_timeout_ms: 2000,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // The host exports the project root to every hook it runs
        figment = figment.merge(
            Env::raw()
                .only(&["CLAUDE_PROJECT_DIR"])
                .map(|_| "project_dir".into()),
        );

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (HL_*)
        figment = figment.merge(Env::prefixed("HL_"));

        figment.extract()
    }

    /// Directory the session logs are written to.
    pub fn resolved_log_dir(&self) -> PathBuf {
        if let Some(dir) = &self.log_dir {
            return dir.clone();
        }
        let project_dir = self
            .project_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        project_dir.join("hooks").join("logs")
    }

    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub const fn project_options(&self) -> ProjectOptions {
        ProjectOptions {
            response_max_chars: self.response_max_chars,
        }
    }
}

/// Returns the platform-specific config directory for hl.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hl"))
}
