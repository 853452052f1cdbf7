//! Assistant text extraction from session transcripts and tool responses.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

/// Buffer size for `BufReader` (64KB for large transcripts)
const BUFFER_SIZE: usize = 64 * 1024;

/// Minimal transcript line for typed deserialization.
#[derive(Debug, Deserialize)]
struct TranscriptLine {
    #[serde(rename = "type")]
    line_type: Option<String>,
    message: Option<TranscriptMessage>,
}

#[derive(Debug, Deserialize)]
struct TranscriptMessage {
    content: Option<MessageContent>,
}

/// Message content can be a string or an array of content blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A content block (text, `tool_use`, ...). Only text blocks matter here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: Option<String>,
    pub text: Option<String>,
}

/// Joins the text blocks with newlines, ignoring every other block type.
pub fn join_text_blocks(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter(|b| b.block_type.as_deref() == Some("text"))
        .map(|b| b.text.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns the text of the last assistant message in a transcript.
///
/// Missing or unreadable files and malformed lines yield what could be read;
/// an empty string when nothing qualifies.
pub fn last_assistant_message(path: &Path) -> String {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "transcript not readable");
            return String::new();
        }
    };
    let reader = BufReader::with_capacity(BUFFER_SIZE, file);

    let mut last = String::new();
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        // Cheap pre-filter before a full parse
        if !line.contains("assistant") {
            continue;
        }
        let parsed: TranscriptLine = match serde_json::from_str(&line) {
            Ok(l) => l,
            Err(e) => {
                tracing::trace!(error = %e, "skipping malformed transcript line");
                continue;
            }
        };
        if parsed.line_type.as_deref() != Some("assistant") {
            continue;
        }

        let text = match parsed.message.and_then(|m| m.content) {
            Some(MessageContent::Text(text)) => text,
            Some(MessageContent::Blocks(blocks)) => join_text_blocks(&blocks),
            None => continue,
        };
        if !text.is_empty() {
            last = text;
        }
    }
    last
}

/// Truncates to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => &content[..end],
        None => content,
    }
}
