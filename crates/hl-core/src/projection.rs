//! Event-kind dispatch from a [`HookEvent`] to flattened record fields.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::correlation::{CorrelationSignal, SpawnDescriptor};
use crate::event::HookEvent;
use crate::event_kind::EventKind;
use crate::record::NormalizedRecord;
use crate::tool::{Fields, TaskResponse, ToolCall, put};
use crate::transcript::{last_assistant_message, truncate_chars};
use crate::types::AgentId;

/// Default cap on extracted assistant and subagent text.
pub const DEFAULT_RESPONSE_MAX_CHARS: usize = 5000;

/// Tunables for projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectOptions {
    /// Longest assistant or subagent text kept, in characters.
    pub response_max_chars: usize,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            response_max_chars: DEFAULT_RESPONSE_MAX_CHARS,
        }
    }
}

/// Event-specific fields plus the correlation signal the event carries, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub fields: Fields,
    pub signal: Option<CorrelationSignal>,
}

impl Projection {
    /// Fills the subagent fields of a completion record.
    pub fn enrich(&mut self, descriptor: &SpawnDescriptor) {
        put(
            &mut self.fields,
            "subagent_type",
            descriptor.subagent_type.clone(),
        );
        put(&mut self.fields, "subagent_model", descriptor.model.clone());
        put(
            &mut self.fields,
            "subagent_description",
            descriptor.description.clone(),
        );
    }

    pub fn into_record(self, event: &HookEvent, ts: DateTime<Utc>) -> NormalizedRecord {
        NormalizedRecord {
            ts,
            session_id: event.session_id.clone(),
            event: event.kind.clone(),
            fields: self.fields,
        }
    }
}

/// Projects one event. Never fails: missing or malformed fields become nulls
/// and unknown kinds or tools fall back to verbatim copies.
pub fn project(event: &HookEvent, options: &ProjectOptions) -> Projection {
    let mut fields = Fields::new();
    copy(&mut fields, event, "cwd");
    copy(&mut fields, event, "permission_mode");

    let mut signal = None;
    match &event.kind {
        EventKind::SessionStart => copy(&mut fields, event, "source"),
        EventKind::SessionEnd => copy(&mut fields, event, "reason"),
        EventKind::UserPromptSubmit => copy(&mut fields, event, "prompt"),
        EventKind::Notification => {
            copy(&mut fields, event, "message");
            copy(&mut fields, event, "notification_type");
        }
        EventKind::PreCompact => copy(&mut fields, event, "trigger"),
        EventKind::Stop => {
            let response = event
                .str_field("transcript_path")
                .and_then(|p| transcript_response(p, options));
            put(&mut fields, "assistant_response", response);
            copy(&mut fields, event, "stop_hook_active");
        }
        EventKind::SubagentStop => {
            copy(&mut fields, event, "agent_id");
            let response = event
                .str_field("agent_transcript_path")
                .filter(|p| !p.is_empty())
                .or_else(|| event.str_field("transcript_path"))
                .and_then(|p| transcript_response(p, options));
            put(&mut fields, "assistant_response", response);
            copy(&mut fields, event, "stop_hook_active");
            for key in ["subagent_type", "subagent_model", "subagent_description"] {
                fields.insert(key.to_string(), Value::Null);
            }
            signal = Some(CorrelationSignal::Completion {
                agent_id: agent_id(event.str_field("agent_id")),
            });
        }
        EventKind::PreToolUse | EventKind::PostToolUse => {
            signal = project_tool(event, options, &mut fields);
        }
        EventKind::Unrecognized(_) => {
            fields.insert("payload".to_string(), Value::Object(event.payload()));
        }
    }

    Projection { fields, signal }
}

fn project_tool(
    event: &HookEvent,
    options: &ProjectOptions,
    fields: &mut Fields,
) -> Option<CorrelationSignal> {
    copy(fields, event, "tool_name");
    copy(fields, event, "tool_use_id");

    let call = ToolCall::parse(event.str_field("tool_name"), event.get("tool_input"));
    call.project(fields);

    let tool_use_id = event.str_field("tool_use_id").map(String::from);
    let post = event.kind == EventKind::PostToolUse;
    if post {
        copy(fields, event, "tool_response");
    }

    let ToolCall::Task(task) = call else {
        return None;
    };
    let descriptor = task.descriptor();
    if !post {
        return Some(CorrelationSignal::SpawnIntent {
            tool_use_id,
            descriptor,
        });
    }

    let response = TaskResponse::decode(event.get("tool_response"));
    put(fields, "agent_id", response.agent_id.clone());
    let text = response.text();
    put(
        fields,
        "subagent_response",
        non_empty(truncate_chars(&text, options.response_max_chars)),
    );

    Some(CorrelationSignal::Registration {
        agent_id: agent_id(response.agent_id.as_deref()),
        tool_use_id,
        descriptor,
    })
}

/// Copies an input field verbatim, null when absent.
fn copy(fields: &mut Fields, event: &HookEvent, key: &str) {
    fields.insert(key.to_string(), event.field(key));
}

fn agent_id(raw: Option<&str>) -> Option<AgentId> {
    raw.and_then(|s| AgentId::new(s).ok())
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn transcript_response(path: &str, options: &ProjectOptions) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    let text = last_assistant_message(Path::new(path));
    non_empty(truncate_chars(&text, options.response_max_chars))
}
