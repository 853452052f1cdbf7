//! The normalized log record.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::event_kind::EventKind;
use crate::tool::Fields;
use crate::types::SessionId;

const ENVELOPE_KEYS: [&str; 3] = ["ts", "session_id", "event"];

/// One flattened record per hook event: the envelope followed by the
/// event-specific fields in projection order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub ts: DateTime<Utc>,
    pub session_id: SessionId,
    pub event: EventKind,
    pub fields: Fields,
}

impl NormalizedRecord {
    /// Serializes to one self-contained JSONL line, newline included.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Returns a projected field by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }
}

impl Serialize for NormalizedRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("ts", &self.ts.to_rfc3339_opts(SecondsFormat::Millis, true))?;
        map.serialize_entry("session_id", &self.session_id)?;
        map.serialize_entry("event", &self.event)?;
        for (key, value) in &self.fields {
            if ENVELOPE_KEYS.contains(&key.as_str()) {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn fixed_ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-29T10:58:45.123Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn envelope_comes_first() {
        let mut fields = Fields::new();
        fields.insert("prompt".to_string(), Value::from("pwd?"));
        fields.insert("cwd".to_string(), Value::Null);
        let record = NormalizedRecord {
            ts: fixed_ts(),
            session_id: SessionId::new("s1").unwrap(),
            event: EventKind::UserPromptSubmit,
            fields,
        };

        insta::assert_snapshot!(
            serde_json::to_string(&record).unwrap(),
            @r#"{"ts":"2026-01-29T10:58:45.123Z","session_id":"s1","event":"UserPromptSubmit","prompt":"pwd?","cwd":null}"#
        );
    }

    #[test]
    fn projected_fields_cannot_shadow_envelope() {
        let mut fields = Fields::new();
        fields.insert("session_id".to_string(), Value::from("forged"));
        let record = NormalizedRecord {
            ts: fixed_ts(),
            session_id: SessionId::new("s1").unwrap(),
            event: EventKind::Stop,
            fields,
        };

        let parsed: Value = serde_json::from_str(&record.to_json_line().unwrap()).unwrap();
        assert_eq!(parsed["session_id"], "s1");
    }

    #[test]
    fn json_line_is_single_line() {
        let mut fields = Fields::new();
        fields.insert("prompt".to_string(), Value::from("two\nlines"));
        let record = NormalizedRecord {
            ts: fixed_ts(),
            session_id: SessionId::new("s1").unwrap(),
            event: EventKind::UserPromptSubmit,
            fields,
        };

        let line = record.to_json_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }
}
