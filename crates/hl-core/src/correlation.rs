//! Subagent correlation.
//!
//! Three independently ordered signals describe one subagent spawn:
//!
//! - a spawn intent, seen when the spawning tool is about to run, which knows
//!   why the subagent is spawned but not its identifier;
//! - a registration, seen when the spawning tool returns, which carries the
//!   identifier together with the full spawn metadata;
//! - a completion, seen when the subagent stops, which carries only the
//!   identifier.
//!
//! [`CorrelationState`] reconciles them. Spawn intents queue up as pending
//! entries in arrival order. Registrations key entries by agent ID. A
//! completion that finds no registered entry claims the oldest pending one.
//!
//! # Known limitation
//!
//! Completions carry no per-call identifier, so a completion that overtakes
//! its registration is matched first-in-first-out. With several subagents of
//! one session in flight at once that match can attribute the wrong metadata.
//! Registrations carry the host's `tool_use_id` when available, which keeps
//! them from retiring the wrong pending entry.

use std::collections::{BTreeMap, VecDeque};
use std::convert::Infallible;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::AgentId;

/// Why a subagent was spawned, as known from the spawning tool's input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnDescriptor {
    #[serde(default)]
    pub subagent_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub run_in_background: Option<bool>,
}

impl SpawnDescriptor {
    /// Overwrites fields with every value `other` actually carries.
    pub fn merge_from(&mut self, other: &Self) {
        if other.subagent_type.is_some() {
            self.subagent_type.clone_from(&other.subagent_type);
        }
        if other.description.is_some() {
            self.description.clone_from(&other.description);
        }
        if other.model.is_some() {
            self.model.clone_from(&other.model);
        }
        if other.run_in_background.is_some() {
            self.run_in_background = other.run_in_background;
        }
    }
}

/// Lifecycle position of a [`CorrelationEntry`]. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Spawn seen, identifier not yet known.
    Pending,
    /// Identifier bound to spawn metadata.
    Registered,
}

/// One subagent spawn lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub state: EntryState,
    pub descriptor: SpawnDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// Host identifier of the spawning tool call, when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    /// When the entry was created or last promoted.
    pub observed_at: DateTime<Utc>,
}

impl CorrelationEntry {
    fn pending(descriptor: SpawnDescriptor, tool_use_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            state: EntryState::Pending,
            descriptor,
            agent_id: None,
            tool_use_id,
            observed_at: now,
        }
    }

    fn promote(&mut self, agent_id: AgentId, now: DateTime<Utc>) {
        self.state = EntryState::Registered;
        self.agent_id = Some(agent_id);
        self.observed_at = now;
    }
}

/// A correlation-relevant observation extracted from one hook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationSignal {
    /// The spawning tool is about to run.
    SpawnIntent {
        tool_use_id: Option<String>,
        descriptor: SpawnDescriptor,
    },
    /// The spawning tool returned.
    Registration {
        agent_id: Option<AgentId>,
        tool_use_id: Option<String>,
        descriptor: SpawnDescriptor,
    },
    /// A subagent stopped.
    Completion { agent_id: Option<AgentId> },
}

/// Correlation table for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationState {
    /// Spawns without a known identifier, oldest first.
    #[serde(default)]
    pending: VecDeque<CorrelationEntry>,
    #[serde(default)]
    registered: BTreeMap<AgentId, CorrelationEntry>,
}

impl CorrelationState {
    /// Applies one signal, returning the spawn metadata a completion resolves to.
    pub fn apply(&mut self, signal: &CorrelationSignal, now: DateTime<Utc>) -> Option<SpawnDescriptor> {
        match signal {
            CorrelationSignal::SpawnIntent {
                tool_use_id,
                descriptor,
            } => {
                self.observe_spawn(descriptor.clone(), tool_use_id.clone(), now);
                None
            }
            CorrelationSignal::Registration {
                agent_id: Some(agent_id),
                tool_use_id,
                descriptor,
            } => {
                self.register(agent_id, tool_use_id.as_deref(), descriptor, now);
                None
            }
            CorrelationSignal::Registration {
                agent_id: None,
                tool_use_id,
                descriptor,
            } => {
                // The call finished without producing a subagent.
                self.take_pending(tool_use_id.as_deref(), descriptor);
                None
            }
            CorrelationSignal::Completion { agent_id } => {
                self.resolve_completion(agent_id.as_ref(), now)
            }
        }
    }

    /// Queues a spawn whose identifier is not known yet.
    pub fn observe_spawn(
        &mut self,
        descriptor: SpawnDescriptor,
        tool_use_id: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.pending
            .push_back(CorrelationEntry::pending(descriptor, tool_use_id, now));
    }

    /// Resolves a completion to spawn metadata.
    ///
    /// A registered entry is returned and kept for later completions. Without
    /// one, the oldest pending entry is claimed and registered under
    /// `agent_id` so a late registration still finds it.
    pub fn resolve_completion(
        &mut self,
        agent_id: Option<&AgentId>,
        now: DateTime<Utc>,
    ) -> Option<SpawnDescriptor> {
        if let Some(entry) = agent_id.and_then(|id| self.registered.get(id)) {
            return Some(entry.descriptor.clone());
        }

        let mut entry = self.pending.pop_front()?;
        let descriptor = entry.descriptor.clone();
        match agent_id {
            Some(id) => {
                tracing::debug!(agent_id = %id, "claimed oldest pending spawn for completion");
                entry.promote(id.clone(), now);
                self.registered.insert(id.clone(), entry);
            }
            None => {
                tracing::debug!("completion without agent id consumed oldest pending spawn");
            }
        }
        Some(descriptor)
    }

    /// Binds `agent_id` to authoritative spawn metadata.
    pub fn register(
        &mut self,
        agent_id: &AgentId,
        tool_use_id: Option<&str>,
        descriptor: &SpawnDescriptor,
        now: DateTime<Utc>,
    ) {
        if let Some(existing) = self.registered.get_mut(agent_id) {
            existing.descriptor.merge_from(descriptor);
            if let Some(call) = tool_use_id {
                existing.tool_use_id = Some(call.to_string());
                // Only an exact call match is safe to retire here; the entry
                // itself was already claimed from the queue.
                if let Some(pos) = self
                    .pending
                    .iter()
                    .position(|e| e.tool_use_id.as_deref() == Some(call))
                {
                    self.pending.remove(pos);
                }
            }
            return;
        }

        let mut entry = self.take_pending(tool_use_id, descriptor).unwrap_or_else(|| {
            CorrelationEntry::pending(descriptor.clone(), tool_use_id.map(String::from), now)
        });
        entry.descriptor.merge_from(descriptor);
        if entry.tool_use_id.is_none() {
            entry.tool_use_id = tool_use_id.map(String::from);
        }
        entry.promote(agent_id.clone(), now);
        self.registered.insert(agent_id.clone(), entry);
    }

    /// Removes the pending entry belonging to a finished spawn call.
    ///
    /// Prefers an equal `tool_use_id`; otherwise takes the first entry with
    /// identical metadata whose call identifier does not contradict.
    fn take_pending(
        &mut self,
        tool_use_id: Option<&str>,
        descriptor: &SpawnDescriptor,
    ) -> Option<CorrelationEntry> {
        let by_call = tool_use_id.and_then(|call| {
            self.pending
                .iter()
                .position(|e| e.tool_use_id.as_deref() == Some(call))
        });
        let pos = by_call.or_else(|| {
            self.pending.iter().position(|e| {
                (tool_use_id.is_none() || e.tool_use_id.is_none()) && e.descriptor == *descriptor
            })
        })?;
        self.pending.remove(pos)
    }

    /// Drops the oldest entries beyond `max` in both the queue and the table.
    pub fn prune(&mut self, max: usize) {
        while self.pending.len() > max {
            self.pending.pop_front();
        }

        if self.registered.len() > max {
            let mut by_age: Vec<(DateTime<Utc>, AgentId)> = self
                .registered
                .iter()
                .map(|(id, e)| (e.observed_at, id.clone()))
                .collect();
            by_age.sort();
            let excess = self.registered.len() - max;
            for (_, id) in by_age.into_iter().take(excess) {
                self.registered.remove(&id);
            }
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &CorrelationEntry> {
        self.pending.iter()
    }

    pub fn registered(&self, agent_id: &AgentId) -> Option<&CorrelationEntry> {
        self.registered.get(agent_id)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.registered.is_empty()
    }
}

/// Persistence for one session's [`CorrelationState`].
///
/// Implementations that guard concurrent invocations must hold their
/// exclusion from before `load` until after `save`.
pub trait StateStorage {
    type Error: std::error::Error;

    fn load(&mut self) -> Result<CorrelationState, Self::Error>;

    fn save(&mut self, state: &CorrelationState) -> Result<(), Self::Error>;
}

/// In-memory storage, mostly useful in tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    pub state: CorrelationState,
    pub saves: usize,
}

impl StateStorage for MemoryStorage {
    type Error = Infallible;

    fn load(&mut self) -> Result<CorrelationState, Self::Error> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &CorrelationState) -> Result<(), Self::Error> {
        self.state = state.clone();
        self.saves += 1;
        Ok(())
    }
}

/// Loads state, applies `signal`, bounds the table, and saves when changed.
///
/// Unreadable state is replaced by an empty table and a failed save is only
/// logged: either way the resolved metadata is still returned, and losing
/// history only costs later enrichment.
pub fn correlate<S: StateStorage>(
    storage: &mut S,
    signal: &CorrelationSignal,
    now: DateTime<Utc>,
    max_tracked: usize,
) -> Option<SpawnDescriptor> {
    let mut state = storage.load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "discarding unreadable correlation state");
        CorrelationState::default()
    });
    let before = state.clone();

    let resolved = state.apply(signal, now);
    state.prune(max_tracked);

    if state != before {
        if let Err(e) = storage.save(&state) {
            tracing::warn!(error = %e, "failed to save correlation state");
        }
    }
    resolved
}
