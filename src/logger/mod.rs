//! Structured state-event logging: JSONL append-only with graceful
//! degradation, plus an in-memory sink for tests and embedders.

pub mod jsonl;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::objects::checkable::{Acknowledgement, StateType};

/// One engine-level state transition worth recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateEvent {
    /// When the transition was observed.
    pub timestamp: DateTime<Utc>,
    /// `host` or `service`.
    pub object_kind: &'static str,
    /// Object name.
    pub object: String,
    #[serde(flatten)]
    /// What happened.
    pub kind: StateEventKind,
}

/// Transition payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StateEventKind {
    /// A check reported a different state than the previous one.
    StateChanged {
        state: String,
        state_type: StateType,
    },
    /// Flapping flag flipped on.
    FlappingStarted { value: f64 },
    /// Flapping flag flipped off.
    FlappingStopped { value: f64 },
    /// An acknowledgement was stored.
    AcknowledgementSet { acknowledgement: Acknowledgement },
    /// A lazy-expiry read cleared a stale acknowledgement.
    AcknowledgementExpired,
    /// A downtime window was scheduled.
    DowntimeScheduled { id: u64 },
    /// A downtime was cancelled before or during its window.
    DowntimeCancelled { id: u64 },
    /// A comment was added.
    CommentAdded { id: u64 },
    /// A comment was removed.
    CommentRemoved { id: u64 },
    /// The expander derived a service from a host descriptor.
    ServiceGenerated { host: String },
    /// The expander retracted a service missing from the new descriptor set.
    ServiceRetracted { host: String },
    /// A host and its generated services were removed.
    HostRemoved,
    /// An intake event named an unknown object and was skipped.
    CheckDiscarded { reason: String },
}

/// Destination for state events. Implementations must never panic or block
/// the engine on failure; recording is best-effort by contract.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &StateEvent);
}

/// Sink that drops everything. Default when no event log is configured.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &StateEvent) {}
}
