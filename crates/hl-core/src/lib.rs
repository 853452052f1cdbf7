//! Core domain logic for the hook logger.
//!
//! This crate contains:
//! - Event reading: decoding and classifying one hook input document
//! - Projection: flattening event- and tool-specific payloads into records
//! - Correlation: linking subagent completions back to their spawn metadata

pub mod correlation;
pub mod event;
mod event_kind;
pub mod projection;
mod record;
pub mod tool;
pub mod transcript;
mod types;

pub use correlation::{
    CorrelationEntry, CorrelationSignal, CorrelationState, EntryState, MemoryStorage,
    SpawnDescriptor, StateStorage, correlate,
};
pub use event::{HookEvent, ReadError, read_event};
pub use event_kind::EventKind;
pub use projection::{ProjectOptions, Projection, project};
pub use record::NormalizedRecord;
pub use tool::{Fields, ToolCall};
pub use types::{AgentId, SessionId, ValidationError};
