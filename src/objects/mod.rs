//! Monitored object model: checkable state, hosts, services, and the owning
//! registry.

pub mod checkable;
pub mod host;
pub mod registry;
pub mod service;
