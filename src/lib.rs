//! Object/state engine for a host-and-service monitoring daemon.
//!
//! Tracks whether monitored entities are flapping, reachable, acknowledged,
//! or in scheduled downtime, and derives per-host service objects from
//! declarative descriptors. The check scheduler, config compiler front-end,
//! and query listener are external collaborators: the scheduler feeds check
//! events in, the compiler feeds config items in, the listener reads state
//! out.
//!
//! Everything is owned by a [`engine::MonitorCore`] instance — there is no
//! process-global state, so each test (or embedder) constructs its own
//! engine.

pub mod cache;
pub mod compiler;
pub mod core;
pub mod engine;
pub mod logger;
pub mod objects;

#[cfg(feature = "cli")]
pub mod cli_app;


pub use crate::core::config::EngineConfig;
pub use crate::core::errors::{MseError, Result};
pub use crate::engine::{CheckEvent, EventTarget, MonitorCore};
pub use crate::objects::checkable::{
    Acknowledgement, CheckState, CheckableRef, HostState, StateType,
};
