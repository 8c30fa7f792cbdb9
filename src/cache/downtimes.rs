//! Downtime and comment records plus the global ownership index.
//!
//! Records live on their owning checkable; the index answers "which object
//! owns downtime N" for cancel-by-id without walking every object on every
//! call. One process-wide dirty flag covers both record kinds — any downtime
//! or comment mutation anywhere invalidates the whole index, favoring
//! correctness over rebuild cost.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::objects::registry::ObjectRegistry;

/// A scheduled downtime window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowntimeRecord {
    pub id: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub text: String,
    pub cancelled: bool,
}

impl DowntimeRecord {
    /// Active iff `now` falls inside the scheduled window and the downtime
    /// has not been cancelled.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.cancelled && self.start <= now && now <= self.end
    }
}

/// A free-form operator comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: u64,
    pub author: String,
    pub text: String,
    pub entry_time: DateTime<Utc>,
}

/// Which checkable owns a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOwner {
    /// Host name.
    Host(String),
    /// Service name.
    Service(String),
}

#[derive(Default)]
struct IndexState {
    valid: bool,
    downtime_owners: BTreeMap<u64, RecordOwner>,
    comment_owners: BTreeMap<u64, RecordOwner>,
}

/// Lazily rebuilt id → owner index for downtimes and comments.
#[derive(Default)]
pub struct DowntimeCommentIndex {
    state: RwLock<IndexState>,
}

impl DowntimeCommentIndex {
    /// Empty, invalid index; the first lookup rebuilds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the whole index dirty.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.valid = false;
        state.downtime_owners.clear();
        state.comment_owners.clear();
    }

    /// Rebuild if dirty, walking every checkable's records once.
    pub fn validate(&self, registry: &ObjectRegistry) {
        if self.state.read().valid {
            return;
        }
        let mut state = self.state.write();
        if state.valid {
            return;
        }
        state.downtime_owners.clear();
        state.comment_owners.clear();
        for host in registry.hosts() {
            let inner = host.lock();
            for id in inner.checkable.downtimes.keys() {
                state
                    .downtime_owners
                    .insert(*id, RecordOwner::Host(host.name().to_string()));
            }
            for id in inner.checkable.comments.keys() {
                state
                    .comment_owners
                    .insert(*id, RecordOwner::Host(host.name().to_string()));
            }
        }
        for service in registry.services() {
            let inner = service.lock();
            for id in inner.checkable.downtimes.keys() {
                state
                    .downtime_owners
                    .insert(*id, RecordOwner::Service(service.name().to_string()));
            }
            for id in inner.checkable.comments.keys() {
                state
                    .comment_owners
                    .insert(*id, RecordOwner::Service(service.name().to_string()));
            }
        }
        state.valid = true;
    }

    /// Owner of a downtime id, validating first.
    #[must_use]
    pub fn downtime_owner(&self, registry: &ObjectRegistry, id: u64) -> Option<RecordOwner> {
        self.validate(registry);
        self.state.read().downtime_owners.get(&id).cloned()
    }

    /// Owner of a comment id, validating first.
    #[must_use]
    pub fn comment_owner(&self, registry: &ObjectRegistry, id: u64) -> Option<RecordOwner> {
        self.validate(registry);
        self.state.read().comment_owners.get(&id).cloned()
    }

    /// Whether the index currently holds valid data.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state.read().valid
    }
}
