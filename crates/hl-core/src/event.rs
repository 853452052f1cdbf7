//! Decoding and classification of raw hook input.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::event_kind::EventKind;
use crate::types::SessionId;

/// Input key carrying the session identifier.
pub const SESSION_ID_KEY: &str = "session_id";

/// Input key carrying the event kind.
pub const EVENT_NAME_KEY: &str = "hook_event_name";

/// Reasons a hook input document cannot be turned into a [`HookEvent`].
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("malformed hook input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("hook input must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// One lifecycle event as delivered by the host.
///
/// Only the session and the event kind are lifted out; everything else stays
/// in the raw field map because its shape depends on the kind.
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    pub session_id: SessionId,
    pub kind: EventKind,
    fields: Map<String, Value>,
}

impl HookEvent {
    /// Decodes and classifies one JSON document.
    pub fn from_json(input: &str) -> Result<Self, ReadError> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(value)
    }

    /// Classifies an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, ReadError> {
        let fields = match value {
            Value::Object(map) => map,
            other => return Err(ReadError::NotAnObject(json_type_name(&other))),
        };

        let session_id = fields
            .get(SESSION_ID_KEY)
            .and_then(Value::as_str)
            .and_then(|s| SessionId::new(s).ok())
            .unwrap_or_else(SessionId::unknown);

        let Ok(kind) = fields
            .get(EVENT_NAME_KEY)
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .parse::<EventKind>();

        Ok(Self {
            session_id,
            kind,
            fields,
        })
    }

    /// Returns the raw value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the value for `key`, or an explicit null when absent.
    pub fn field(&self, key: &str) -> Value {
        self.fields.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Returns the value for `key` when it is a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns every input field except the session and event kind.
    pub fn payload(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(k, _)| k.as_str() != SESSION_ID_KEY && k.as_str() != EVENT_NAME_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Reads one hook event, absorbing every decode failure.
///
/// Returns `None` for malformed input: the caller sits in the host's critical
/// path and must treat this as a no-op.
pub fn read_event(input: &str) -> Option<HookEvent> {
    match HookEvent::from_json(input) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring hook input");
            None
        }
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_event() {
        let event = HookEvent::from_json(
            r#"{"session_id":"s1","hook_event_name":"UserPromptSubmit","prompt":"pwd?"}"#,
        )
        .unwrap();

        assert_eq!(event.session_id.as_str(), "s1");
        assert_eq!(event.kind, EventKind::UserPromptSubmit);
        assert_eq!(event.str_field("prompt"), Some("pwd?"));
    }

    #[test]
    fn unknown_event_name_is_unrecognized() {
        let event =
            HookEvent::from_json(r#"{"session_id":"s1","hook_event_name":"Teleport"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Unrecognized("Teleport".to_string()));
    }

    #[test]
    fn missing_envelope_fields_get_placeholders() {
        let event = HookEvent::from_json(r#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(event.session_id, SessionId::unknown());
        assert_eq!(event.kind, EventKind::Unrecognized("unknown".to_string()));
    }

    #[test]
    fn non_string_session_id_falls_back() {
        let event =
            HookEvent::from_json(r#"{"session_id":42,"hook_event_name":"Stop"}"#).unwrap();
        assert_eq!(event.session_id, SessionId::unknown());
    }

    #[test]
    fn rejects_non_object() {
        let err = HookEvent::from_json("[1,2]").unwrap_err();
        assert!(matches!(err, ReadError::NotAnObject("array")));
    }

    #[test]
    fn read_event_swallows_malformed_input() {
        assert!(read_event("").is_none());
        assert!(read_event("{not json").is_none());
        assert!(read_event("\"string\"").is_none());
        assert!(read_event("null").is_none());
    }

    #[test]
    fn field_defaults_to_null() {
        let event =
            HookEvent::from_json(r#"{"session_id":"s1","hook_event_name":"Stop"}"#).unwrap();
        assert_eq!(event.field("cwd"), Value::Null);
        assert!(event.get("cwd").is_none());
    }

    #[test]
    fn payload_excludes_envelope() {
        let event = HookEvent::from_json(
            r#"{"session_id":"s1","hook_event_name":"Teleport","target":"mars"}"#,
        )
        .unwrap();
        let payload = event.payload();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload["target"], "mars");
    }
}
