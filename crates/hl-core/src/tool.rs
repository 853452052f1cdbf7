//! Per-tool input schemas and their flattened projections.
//!
//! Every known tool declares a fixed key set. Source values are copied as
//! they arrive; a missing one is still written, as null, so all records for
//! one tool share a shape. Derived lengths only count strings.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::correlation::SpawnDescriptor;
use crate::transcript::{ContentBlock, join_text_blocks};

/// Flattened output fields, in insertion order.
pub type Fields = Map<String, Value>;

/// Inserts `value` under `key`, or an explicit null.
pub(crate) fn put<T: Into<Value>>(fields: &mut Fields, key: &str, value: Option<T>) {
    fields.insert(key.to_string(), value.map_or(Value::Null, Into::into));
}

/// Deserializes a field, treating a value of the wrong type as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Decodes a tool input object; anything else yields all-absent fields.
fn decode<T: DeserializeOwned + Default>(input: Option<&Value>) -> T {
    input
        .filter(|v| v.is_object())
        .and_then(|v| T::deserialize(v).ok())
        .unwrap_or_default()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BashInput {
    #[serde(default)]
    pub command: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub timeout: Option<Value>,
    #[serde(default)]
    pub run_in_background: Option<Value>,
    #[serde(default, rename = "dangerouslyDisableSandbox")]
    pub disable_sandbox: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReadInput {
    #[serde(default)]
    pub file_path: Option<Value>,
    #[serde(default)]
    pub offset: Option<Value>,
    #[serde(default)]
    pub limit: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WriteInput {
    #[serde(default)]
    pub file_path: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EditInput {
    #[serde(default)]
    pub file_path: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub old_string: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub new_string: Option<String>,
    #[serde(default)]
    pub replace_all: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GrepInput {
    #[serde(default)]
    pub pattern: Option<Value>,
    #[serde(default)]
    pub path: Option<Value>,
    #[serde(default)]
    pub glob: Option<Value>,
    #[serde(default)]
    pub output_mode: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GlobInput {
    #[serde(default)]
    pub pattern: Option<Value>,
    #[serde(default)]
    pub path: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebSearchInput {
    #[serde(default)]
    pub query: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebFetchInput {
    #[serde(default)]
    pub url: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskOutputInput {
    #[serde(default)]
    pub task_id: Option<Value>,
    #[serde(default)]
    pub block: Option<Value>,
    #[serde(default)]
    pub timeout: Option<Value>,
}

/// Input of the subagent-spawning tool.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskInput {
    #[serde(default)]
    pub subagent_type: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub model: Option<Value>,
    #[serde(default)]
    pub run_in_background: Option<Value>,
    #[serde(default)]
    pub resume: Option<Value>,
}

impl TaskInput {
    /// Spawn metadata for correlation; only values of the expected type count.
    pub fn descriptor(&self) -> SpawnDescriptor {
        let text = |v: Option<&Value>| v.and_then(Value::as_str).map(String::from);
        SpawnDescriptor {
            subagent_type: text(self.subagent_type.as_ref()),
            description: text(self.description.as_ref()),
            model: text(self.model.as_ref()),
            run_in_background: self.run_in_background.as_ref().and_then(Value::as_bool),
        }
    }
}

/// Response of the subagent-spawning tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskResponse {
    #[serde(default, rename = "agentId", deserialize_with = "lenient")]
    pub agent_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<Vec<ContentBlock>>,
}

impl TaskResponse {
    pub fn decode(response: Option<&Value>) -> Self {
        decode(response)
    }

    /// Text blocks of the subagent's answer joined by newlines.
    pub fn text(&self) -> String {
        self.content.as_deref().map(join_text_blocks).unwrap_or_default()
    }
}

/// A tool call's input, one variant per known tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    Bash(BashInput),
    Read(ReadInput),
    Write(WriteInput),
    Edit(EditInput),
    Grep(GrepInput),
    Glob(GlobInput),
    WebSearch(WebSearchInput),
    WebFetch(WebFetchInput),
    TaskOutput(TaskOutputInput),
    Task(TaskInput),
    /// Any other tool; the input is kept verbatim.
    Other { input: Value },
}

impl ToolCall {
    /// Dispatches on the tool name. Unknown names fall back to [`ToolCall::Other`].
    pub fn parse(name: Option<&str>, input: Option<&Value>) -> Self {
        match name {
            Some("Bash") => Self::Bash(decode(input)),
            Some("Read") => Self::Read(decode(input)),
            Some("Write") => Self::Write(decode(input)),
            Some("Edit") => Self::Edit(decode(input)),
            Some("Grep") => Self::Grep(decode(input)),
            Some("Glob") => Self::Glob(decode(input)),
            Some("WebSearch") => Self::WebSearch(decode(input)),
            Some("WebFetch") => Self::WebFetch(decode(input)),
            Some("TaskOutput") => Self::TaskOutput(decode(input)),
            Some("Task") => Self::Task(decode(input)),
            _ => Self::Other {
                input: input.cloned().unwrap_or(Value::Null),
            },
        }
    }

    /// Writes this tool's fixed key set.
    pub fn project(&self, fields: &mut Fields) {
        match self {
            Self::Bash(i) => {
                put(fields, "bash_command", i.command.clone());
                put(fields, "bash_description", i.description.clone());
                put(fields, "bash_timeout", i.timeout.clone());
                put(fields, "bash_background", i.run_in_background.clone());
                put(fields, "bash_no_sandbox", i.disable_sandbox.clone());
            }
            Self::Read(i) => {
                put(fields, "file_path", i.file_path.clone());
                put(fields, "read_offset", i.offset.clone());
                put(fields, "read_limit", i.limit.clone());
            }
            Self::Write(i) => {
                put(fields, "file_path", i.file_path.clone());
                put(fields, "write_content_length", i.content.as_deref().map(char_len));
            }
            Self::Edit(i) => {
                put(fields, "file_path", i.file_path.clone());
                put(fields, "edit_replace_all", i.replace_all.clone());
                put(fields, "edit_old_length", i.old_string.as_deref().map(char_len));
                put(fields, "edit_new_length", i.new_string.as_deref().map(char_len));
            }
            Self::Grep(i) => {
                put(fields, "grep_pattern", i.pattern.clone());
                put(fields, "grep_path", i.path.clone());
                put(fields, "grep_glob", i.glob.clone());
                put(fields, "grep_output_mode", i.output_mode.clone());
            }
            Self::Glob(i) => {
                put(fields, "glob_pattern", i.pattern.clone());
                put(fields, "glob_path", i.path.clone());
            }
            Self::WebSearch(i) => put(fields, "search_query", i.query.clone()),
            Self::WebFetch(i) => put(fields, "fetch_url", i.url.clone()),
            Self::TaskOutput(i) => {
                put(fields, "task_output_id", i.task_id.clone());
                put(fields, "task_output_block", i.block.clone());
                put(fields, "task_output_timeout", i.timeout.clone());
            }
            Self::Task(i) => {
                put(fields, "subagent_type", i.subagent_type.clone());
                put(fields, "subagent_model", i.model.clone());
                put(fields, "subagent_description", i.description.clone());
                put(fields, "subagent_run_in_background", i.run_in_background.clone());
                put(fields, "subagent_resume", i.resume.clone());
            }
            Self::Other { input } => {
                fields.insert("tool_input".to_string(), input.clone());
            }
        }
    }
}
