//! Engine coordinator: object lifecycle, check-result application, downtime
//! and comment bookkeeping.
//!
//! [`MonitorCore`] owns the registry, both derived caches, the committed-item
//! index, and the event sink. One instance per process (or per test) —
//! nothing in the engine is static. Commit and removal handlers are methods
//! wired at construction time, not registered lazily.

pub mod acknowledgement;
pub mod expand;
pub mod flapping;
pub mod intake;
pub mod reachability;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::cache::downtimes::{CommentRecord, DowntimeCommentIndex, DowntimeRecord, RecordOwner};
use crate::cache::services::ServiceCache;
use crate::compiler::item::{
    CompilerContext, ConfigItem, ConfigItemBuilder, ItemIndex, ObjectKind,
};
use crate::core::config::EngineConfig;
use crate::core::errors::Result;
use crate::logger::jsonl::JsonlSink;
use crate::logger::{EventSink, NullSink, StateEvent, StateEventKind};
use crate::objects::checkable::{
    CheckResult, CheckState, CheckableRef, HostState, StateType,
};
use crate::objects::host::Host;
use crate::objects::registry::ObjectRegistry;
use crate::objects::service::Service;

/// Target and reported state of one completed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTarget {
    /// Host-targeted check.
    Host {
        /// Host name.
        name: String,
        /// Reported liveness.
        state: HostState,
    },
    /// Service-targeted check.
    Service {
        /// Service name.
        name: String,
        /// Reported state.
        state: CheckState,
    },
}

impl EventTarget {
    /// Name of the checkable the event addresses.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Host { name, .. } | Self::Service { name, .. } => name,
        }
    }
}

/// One event from the check-execution pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckEvent {
    /// What was checked and what it reported.
    pub target: EventTarget,
    /// Whether this check's state differs from the previous one.
    pub state_changed: bool,
    /// Soft while retrying, hard once confirmed.
    pub state_type: StateType,
    /// When the check completed.
    pub timestamp: DateTime<Utc>,
    /// Raw plugin output, if any.
    pub output: Option<String>,
}

/// The object/state engine. See the module docs.
pub struct MonitorCore {
    config: EngineConfig,
    registry: ObjectRegistry,
    service_cache: ServiceCache,
    downtime_index: DowntimeCommentIndex,
    items: RwLock<ItemIndex>,
    next_record_id: AtomicU64,
    events: Arc<dyn EventSink>,
}

impl MonitorCore {
    /// Engine with the sink implied by the config: JSONL when an event-log
    /// path is set, otherwise discard.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let events: Arc<dyn EventSink> = match &config.event_log {
            Some(path) => Arc::new(JsonlSink::open(path)?),
            None => Arc::new(NullSink),
        };
        Ok(Self::with_sink(config, events))
    }

    /// Engine with an explicit event sink.
    #[must_use]
    pub fn with_sink(config: EngineConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            registry: ObjectRegistry::new(),
            service_cache: ServiceCache::new(),
            downtime_index: DowntimeCommentIndex::new(),
            items: RwLock::new(ItemIndex::new()),
            next_record_id: AtomicU64::new(0),
            events,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Owning object registry.
    #[must_use]
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Host → services cache.
    #[must_use]
    pub fn service_cache(&self) -> &ServiceCache {
        &self.service_cache
    }

    /// Downtime/comment ownership index.
    #[must_use]
    pub fn downtime_index(&self) -> &DowntimeCommentIndex {
        &self.downtime_index
    }

    /// Checkable handle for a host name.
    pub fn host_ref(&self, name: &str) -> Result<CheckableRef> {
        Ok(CheckableRef::Host(self.registry.expect_host(name)?))
    }

    /// Checkable handle for a service name.
    pub fn service_ref(&self, name: &str) -> Result<CheckableRef> {
        Ok(CheckableRef::Service(self.registry.expect_service(name)?))
    }

    // ──────────────────── configuration commits ────────────────────

    /// Compile a builder against the committed items and commit the result.
    /// Failures are reported to the sink and abort this item only.
    pub fn commit(&self, builder: &ConfigItemBuilder, ctx: &mut CompilerContext) -> Result<()> {
        let compiled = {
            let items = self.items.read();
            builder.compile(&items)
        };
        let item = match compiled {
            Ok(item) => item,
            Err(err) => {
                ctx.add_error(false, err.to_string());
                return Err(err);
            }
        };
        self.commit_item(item, ctx)
    }

    /// Commit an already-compiled item: register it for inheritance and,
    /// unless it is a template, build or update the concrete object.
    pub fn commit_item(&self, item: ConfigItem, ctx: &mut CompilerContext) -> Result<()> {
        self.items.write().insert(item.clone());
        if item.is_template {
            return Ok(());
        }
        let result = match item.kind {
            ObjectKind::Host => self.commit_host(&item, ctx),
            ObjectKind::Service => self.commit_service(&item),
        };
        if let Err(err) = &result {
            ctx.add_error(false, err.to_string());
        }
        result
    }

    fn commit_host(&self, item: &ConfigItem, ctx: &mut CompilerContext) -> Result<()> {
        if let Some(host) = self.registry.host(&item.name) {
            host.reconfigure(&item.attrs)?;
        } else {
            let host = Host::from_attributes(&item.name, &item.attrs)?;
            self.registry.insert_host(Arc::new(host));
        }
        self.invalidate_structural_caches();
        self.expand_host_services(item, ctx)
    }

    fn commit_service(&self, item: &ConfigItem) -> Result<()> {
        let service = Service::from_attributes(&item.name, &item.attrs)?;
        self.registry.insert_service(Arc::new(service));
        self.invalidate_structural_caches();
        Ok(())
    }

    /// Remove a committed item and its object. Removing a host retracts
    /// every service generated for it. Unknown names are a no-op.
    pub fn remove(&self, kind: ObjectKind, name: &str) {
        self.items.write().remove(kind, name);
        match kind {
            ObjectKind::Host => self.remove_host(name),
            ObjectKind::Service => {
                if self.registry.remove_service(name).is_some() {
                    self.invalidate_structural_caches();
                }
            }
        }
    }

    fn remove_host(&self, name: &str) {
        let Some(host) = self.registry.remove_host(name) else {
            return;
        };
        let generated: Vec<String> = host.lock().generated_services.iter().cloned().collect();
        for service_name in generated {
            self.retract_service(&service_name, name);
        }
        self.invalidate_structural_caches();
        self.emit("host", name, StateEventKind::HostRemoved);
    }

    pub(crate) fn invalidate_structural_caches(&self) {
        self.service_cache.invalidate();
        self.downtime_index.invalidate();
    }

    pub(crate) fn items(&self) -> &RwLock<ItemIndex> {
        &self.items
    }

    // ──────────────────── check pipeline ────────────────────

    /// Apply one completed check: state fields, last check result, and the
    /// flapping window, all under the target's mutex.
    pub fn apply_check_event(&self, event: &CheckEvent) -> Result<()> {
        let (target, state_label, flip, value) = match &event.target {
            EventTarget::Service { name, state } => {
                let service = self.registry.expect_service(name)?;
                let (flip, value) = {
                    let mut inner = service.lock();
                    inner.state = *state;
                    inner.checkable.state_type = event.state_type;
                    inner.checkable.last_check_result = Some(CheckResult {
                        executed_at: event.timestamp,
                        output: event.output.clone(),
                    });
                    let (low, high) = inner.checkable.thresholds(&self.config);
                    let flip = inner.checkable.flapping.record(
                        event.state_changed,
                        low,
                        high,
                        event.timestamp,
                    );
                    (flip, inner.checkable.flapping.current())
                };
                (
                    CheckableRef::Service(service),
                    state.as_str(),
                    flip,
                    value,
                )
            }
            EventTarget::Host { name, state } => {
                let host = self.registry.expect_host(name)?;
                let (flip, value) = {
                    let mut inner = host.lock();
                    inner.state = *state;
                    inner.checkable.state_type = event.state_type;
                    inner.checkable.last_check_result = Some(CheckResult {
                        executed_at: event.timestamp,
                        output: event.output.clone(),
                    });
                    let (low, high) = inner.checkable.thresholds(&self.config);
                    let flip = inner.checkable.flapping.record(
                        event.state_changed,
                        low,
                        high,
                        event.timestamp,
                    );
                    (flip, inner.checkable.flapping.current())
                };
                (CheckableRef::Host(host), state.as_str(), flip, value)
            }
        };

        if event.state_changed {
            self.emit_at(
                event.timestamp,
                target.kind(),
                target.name(),
                StateEventKind::StateChanged {
                    state: state_label.to_string(),
                    state_type: event.state_type,
                },
            );
        }
        match flip {
            Some(true) => self.emit_at(
                event.timestamp,
                target.kind(),
                target.name(),
                StateEventKind::FlappingStarted { value },
            ),
            Some(false) => self.emit_at(
                event.timestamp,
                target.kind(),
                target.name(),
                StateEventKind::FlappingStopped { value },
            ),
            None => {}
        }
        Ok(())
    }

    /// Record one state-change flag without touching the monitoring state.
    /// Entry point for schedulers that drive flapping separately.
    pub fn update_flapping_status(&self, target: &CheckableRef, state_changed: bool) {
        let now = Utc::now();
        let (flip, value) = target.with_state(|state| {
            let (low, high) = state.thresholds(&self.config);
            let flip = state.flapping.record(state_changed, low, high, now);
            (flip, state.flapping.current())
        });
        match flip {
            Some(true) => self.emit_at(
                now,
                target.kind(),
                target.name(),
                StateEventKind::FlappingStarted { value },
            ),
            Some(false) => self.emit_at(
                now,
                target.kind(),
                target.name(),
                StateEventKind::FlappingStopped { value },
            ),
            None => {}
        }
    }

    /// Policy-aware flapping flag: false when detection is disabled
    /// globally or for the object; the persisted flag otherwise. Never
    /// recomputes.
    #[must_use]
    pub fn is_flapping(&self, target: &CheckableRef) -> bool {
        if !self.config.enable_flapping {
            return false;
        }
        target.with_state(|state| state.enable_flapping && state.flapping.flag())
    }

    /// Weighted state-change percentage from the last update.
    #[must_use]
    pub fn flapping_value(&self, target: &CheckableRef) -> f64 {
        target.with_state(|state| state.flapping.current())
    }

    // ──────────────────── downtimes and comments ────────────────────

    /// Schedule a downtime window on a checkable; returns its id.
    pub fn schedule_downtime(
        &self,
        target: &CheckableRef,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        text: &str,
    ) -> u64 {
        let id = self.next_record_id.fetch_add(1, Ordering::Relaxed) + 1;
        target.with_state(|state| {
            state.downtimes.insert(
                id,
                DowntimeRecord {
                    id,
                    start,
                    end,
                    text: text.to_string(),
                    cancelled: false,
                },
            );
        });
        self.downtime_index.invalidate();
        self.emit(
            target.kind(),
            target.name(),
            StateEventKind::DowntimeScheduled { id },
        );
        id
    }

    /// Cancel a downtime by id. False when the id is unknown or the
    /// downtime was already cancelled.
    pub fn cancel_downtime(&self, id: u64) -> bool {
        let Some(owner) = self.downtime_index.downtime_owner(&self.registry, id) else {
            return false;
        };
        let Some(target) = self.resolve_owner(&owner) else {
            return false;
        };
        let cancelled = target.with_state(|state| {
            state.downtimes.get_mut(&id).is_some_and(|downtime| {
                if downtime.cancelled {
                    false
                } else {
                    downtime.cancelled = true;
                    true
                }
            })
        });
        if cancelled {
            self.downtime_index.invalidate();
            self.emit(
                target.kind(),
                target.name(),
                StateEventKind::DowntimeCancelled { id },
            );
        }
        cancelled
    }

    /// Add a comment to a checkable; returns its id.
    pub fn add_comment(&self, target: &CheckableRef, author: &str, text: &str) -> u64 {
        let id = self.next_record_id.fetch_add(1, Ordering::Relaxed) + 1;
        target.with_state(|state| {
            state.comments.insert(
                id,
                CommentRecord {
                    id,
                    author: author.to_string(),
                    text: text.to_string(),
                    entry_time: Utc::now(),
                },
            );
        });
        self.downtime_index.invalidate();
        self.emit(
            target.kind(),
            target.name(),
            StateEventKind::CommentAdded { id },
        );
        id
    }

    /// Remove a comment by id. False when the id is unknown.
    pub fn remove_comment(&self, id: u64) -> bool {
        let Some(owner) = self.downtime_index.comment_owner(&self.registry, id) else {
            return false;
        };
        let Some(target) = self.resolve_owner(&owner) else {
            return false;
        };
        let removed = target.with_state(|state| state.comments.remove(&id).is_some());
        if removed {
            self.downtime_index.invalidate();
            self.emit(
                target.kind(),
                target.name(),
                StateEventKind::CommentRemoved { id },
            );
        }
        removed
    }

    /// Downtime records of a checkable, validating the index first.
    #[must_use]
    pub fn downtimes_of(&self, target: &CheckableRef) -> Vec<DowntimeRecord> {
        self.downtime_index.validate(&self.registry);
        target.with_state(|state| state.downtimes.values().cloned().collect())
    }

    /// Comment records of a checkable, validating the index first.
    #[must_use]
    pub fn comments_of(&self, target: &CheckableRef) -> Vec<CommentRecord> {
        self.downtime_index.validate(&self.registry);
        target.with_state(|state| state.comments.values().cloned().collect())
    }

    /// Whether any of the checkable's downtimes is active right now.
    #[must_use]
    pub fn is_in_downtime(&self, target: &CheckableRef) -> bool {
        self.is_in_downtime_at(target, Utc::now())
    }

    /// Downtime test against an explicit clock.
    #[must_use]
    pub fn is_in_downtime_at(&self, target: &CheckableRef, now: DateTime<Utc>) -> bool {
        self.downtime_index.validate(&self.registry);
        target.with_state(|state| state.downtimes.values().any(|d| d.is_active(now)))
    }

    /// Attribute-change notification from the config layer. Group
    /// membership changes invalidate both caches; downtime/comment
    /// attribute traffic invalidates the ownership index.
    pub fn notify_attribute_changed(&self, attribute: &str) {
        match attribute {
            "downtimes" | "comments" => self.downtime_index.invalidate(),
            "hostgroups" => self.invalidate_structural_caches(),
            _ => {}
        }
    }

    /// Live services of a host, through the cache.
    #[must_use]
    pub fn services_of(&self, host_name: &str) -> Vec<Arc<Service>> {
        self.service_cache.services_for(&self.registry, host_name)
    }

    fn resolve_owner(&self, owner: &RecordOwner) -> Option<CheckableRef> {
        match owner {
            RecordOwner::Host(name) => self.registry.host(name).map(CheckableRef::Host),
            RecordOwner::Service(name) => self.registry.service(name).map(CheckableRef::Service),
        }
    }

    pub(crate) fn emit(&self, object_kind: &'static str, object: &str, kind: StateEventKind) {
        self.emit_at(Utc::now(), object_kind, object, kind);
    }

    pub(crate) fn emit_at(
        &self,
        timestamp: DateTime<Utc>,
        object_kind: &'static str,
        object: &str,
        kind: StateEventKind,
    ) {
        self.events.record(&StateEvent {
            timestamp,
            object_kind,
            object: object.to_string(),
            kind,
        });
    }
}
