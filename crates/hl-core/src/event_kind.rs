//! Hook event kinds as the single source of truth for event name strings.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle event kinds emitted by the host runtime.
///
/// Names the host sends that are not listed here parse to
/// [`EventKind::Unrecognized`] so newer hosts keep logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionStart,
    SessionEnd,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    Stop,
    SubagentStop,
    Notification,
    PreCompact,
    Unrecognized(String),
}

impl EventKind {
    /// Returns the host's wire name for this event kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::Stop => "Stop",
            Self::SubagentStop => "SubagentStop",
            Self::Notification => "Notification",
            Self::PreCompact => "PreCompact",
            Self::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "SessionStart" => Self::SessionStart,
            "SessionEnd" => Self::SessionEnd,
            "UserPromptSubmit" => Self::UserPromptSubmit,
            "PreToolUse" => Self::PreToolUse,
            "PostToolUse" => Self::PostToolUse,
            "Stop" => Self::Stop,
            "SubagentStop" => Self::SubagentStop,
            "Notification" => Self::Notification,
            "PreCompact" => Self::PreCompact,
            other => Self::Unrecognized(other.to_string()),
        })
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let Ok(kind) = s.parse::<Self>();
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_variants() {
        let variants = [
            EventKind::SessionStart,
            EventKind::SessionEnd,
            EventKind::UserPromptSubmit,
            EventKind::PreToolUse,
            EventKind::PostToolUse,
            EventKind::Stop,
            EventKind::SubagentStop,
            EventKind::Notification,
            EventKind::PreCompact,
        ];

        for variant in &variants {
            let s = variant.to_string();
            let parsed: EventKind = s.parse().unwrap();
            assert_eq!(parsed, *variant, "roundtrip failed for {variant:?}");
        }
    }

    #[test]
    fn unknown_name_is_preserved() {
        let parsed: EventKind = "PermissionRequest".parse().unwrap();
        assert_eq!(
            parsed,
            EventKind::Unrecognized("PermissionRequest".to_string())
        );
        assert_eq!(parsed.to_string(), "PermissionRequest");
    }

    #[test]
    fn serializes_as_wire_name() {
        let json = serde_json::to_string(&EventKind::SubagentStop).unwrap();
        assert_eq!(json, "\"SubagentStop\"");
    }
}
