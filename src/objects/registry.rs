//! Owning registry for hosts and services.
//!
//! The registry is the single owner of object lifetimes; caches hold weak
//! references into it. Lookups that must succeed return NotFound-class
//! errors — a dangling name is a configuration integrity problem that has
//! to surface, never be masked.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::errors::{MseError, Result};
use crate::objects::host::Host;
use crate::objects::service::Service;

/// Process-wide object store behind read-mostly locks.
#[derive(Default)]
pub struct ObjectRegistry {
    hosts: RwLock<BTreeMap<String, Arc<Host>>>,
    services: RwLock<BTreeMap<String, Arc<Service>>>,
}

impl ObjectRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host by name, if present.
    #[must_use]
    pub fn host(&self, name: &str) -> Option<Arc<Host>> {
        self.hosts.read().get(name).cloned()
    }

    /// Host by name, NotFound error otherwise.
    pub fn expect_host(&self, name: &str) -> Result<Arc<Host>> {
        self.host(name).ok_or_else(|| MseError::HostNotFound {
            name: name.to_string(),
        })
    }

    /// Service by name, if present.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<Arc<Service>> {
        self.services.read().get(name).cloned()
    }

    /// Service by name, NotFound error otherwise.
    pub fn expect_service(&self, name: &str) -> Result<Arc<Service>> {
        self.service(name).ok_or_else(|| MseError::ServiceNotFound {
            name: name.to_string(),
        })
    }

    /// Whether a host with this name exists.
    #[must_use]
    pub fn host_exists(&self, name: &str) -> bool {
        self.hosts.read().contains_key(name)
    }

    /// Whether a service with this name exists.
    #[must_use]
    pub fn service_exists(&self, name: &str) -> bool {
        self.services.read().contains_key(name)
    }

    /// Insert or replace a host; returns the displaced object.
    pub fn insert_host(&self, host: Arc<Host>) -> Option<Arc<Host>> {
        self.hosts.write().insert(host.name().to_string(), host)
    }

    /// Remove a host by name.
    pub fn remove_host(&self, name: &str) -> Option<Arc<Host>> {
        self.hosts.write().remove(name)
    }

    /// Insert or replace a service; returns the displaced object.
    pub fn insert_service(&self, service: Arc<Service>) -> Option<Arc<Service>> {
        self.services
            .write()
            .insert(service.name().to_string(), service)
    }

    /// Remove a service by name.
    pub fn remove_service(&self, name: &str) -> Option<Arc<Service>> {
        self.services.write().remove(name)
    }

    /// Snapshot of all hosts, name-ordered.
    #[must_use]
    pub fn hosts(&self) -> Vec<Arc<Host>> {
        self.hosts.read().values().cloned().collect()
    }

    /// Snapshot of all services, name-ordered.
    #[must_use]
    pub fn services(&self) -> Vec<Arc<Service>> {
        self.services.read().values().cloned().collect()
    }

    /// Live host count.
    #[must_use]
    pub fn host_count(&self) -> usize {
        self.hosts.read().len()
    }

    /// Live service count.
    #[must_use]
    pub fn service_count(&self) -> usize {
        self.services.read().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::ObjectRegistry;
    use crate::objects::host::Host;
    use crate::objects::service::Service;

    fn host(name: &str) -> Arc<Host> {
        let attrs = json!({}).as_object().cloned().unwrap();
        Arc::new(Host::from_attributes(name, &attrs).unwrap())
    }

    fn service(name: &str, host_name: &str) -> Arc<Service> {
        let attrs = json!({"host_name": host_name}).as_object().cloned().unwrap();
        Arc::new(Service::from_attributes(name, &attrs).unwrap())
    }

    #[test]
    fn lookups_surface_not_found() {
        let registry = ObjectRegistry::new();
        assert_eq!(registry.expect_host("gw").unwrap_err().code(), "MSE-2001");
        assert_eq!(
            registry.expect_service("gw-ping").unwrap_err().code(),
            "MSE-2002"
        );

        registry.insert_host(host("gw"));
        registry.insert_service(service("gw-ping", "gw"));
        assert!(registry.expect_host("gw").is_ok());
        assert!(registry.expect_service("gw-ping").is_ok());
    }

    #[test]
    fn insert_replaces_and_reports_displaced_object() {
        let registry = ObjectRegistry::new();
        assert!(registry.insert_host(host("gw")).is_none());
        assert!(registry.insert_host(host("gw")).is_some());
        assert_eq!(registry.host_count(), 1);
    }

    #[test]
    fn removal_drops_ownership() {
        let registry = ObjectRegistry::new();
        registry.insert_service(service("gw-ping", "gw"));
        let removed = registry.remove_service("gw-ping").unwrap();
        assert_eq!(registry.service_count(), 0);
        // The registry was the only other owner.
        assert_eq!(Arc::strong_count(&removed), 1);
    }
}
