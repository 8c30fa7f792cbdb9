//! Host name → services index over weak references.
//!
//! The registry owns service lifetimes; this cache holds non-owning entries
//! so destruction never has to notify it. Invalidation clears storage
//! immediately and marks the cache dirty; the next read performs a full
//! O(total services) rebuild. Dead weak references found during a read are
//! skipped, not pruned — the next rebuild clears them anyway.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::objects::registry::ObjectRegistry;
use crate::objects::service::Service;

#[derive(Default)]
struct CacheState {
    valid: bool,
    by_host: HashMap<String, Vec<Weak<Service>>>,
}

/// Read-mostly, rebuild-rarely services index.
#[derive(Default)]
pub struct ServiceCache {
    state: RwLock<CacheState>,
}

impl ServiceCache {
    /// Empty, invalid cache; the first read rebuilds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark dirty and drop stored entries immediately, so a rebuild is
    /// unconditionally required before any subsequent read returns data.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.valid = false;
        state.by_host.clear();
    }

    /// Rebuild if dirty. No-op on the read fast path when already valid.
    pub fn validate(&self, registry: &ObjectRegistry) {
        if self.state.read().valid {
            return;
        }
        let mut state = self.state.write();
        // Another rebuild may have won the race between the locks.
        if state.valid {
            return;
        }
        state.by_host.clear();
        for service in registry.services() {
            state
                .by_host
                .entry(service.host_name().to_string())
                .or_default()
                .push(Arc::downgrade(&service));
        }
        state.valid = true;
    }

    /// Live services filed under a host name. Validates first; dead weak
    /// references are silently skipped.
    #[must_use]
    pub fn services_for(&self, registry: &ObjectRegistry, host_name: &str) -> Vec<Arc<Service>> {
        self.validate(registry);
        let state = self.state.read();
        state
            .by_host
            .get(host_name)
            .map(|entries| entries.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Whether the cache currently holds valid data.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state.read().valid
    }

    /// Number of stored entries for a host, dead or alive. Test hook for
    /// the lazy-pruning contract.
    #[must_use]
    pub fn stored_len(&self, host_name: &str) -> usize {
        self.state
            .read()
            .by_host
            .get(host_name)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::ServiceCache;
    use crate::objects::registry::ObjectRegistry;
    use crate::objects::service::Service;

    fn insert_service(registry: &ObjectRegistry, name: &str, host: &str) {
        let attrs = json!({"host_name": host}).as_object().cloned().unwrap();
        registry.insert_service(Arc::new(Service::from_attributes(name, &attrs).unwrap()));
    }

    #[test]
    fn rebuild_buckets_services_by_host() {
        let registry = ObjectRegistry::new();
        insert_service(&registry, "web1-http", "web1");
        insert_service(&registry, "web1-ssh", "web1");
        insert_service(&registry, "db1-postgres", "db1");

        let cache = ServiceCache::new();
        let services = cache.services_for(&registry, "web1");
        assert_eq!(services.len(), 2);
        assert!(cache.is_valid());
        assert_eq!(cache.services_for(&registry, "db1").len(), 1);
        assert!(cache.services_for(&registry, "absent").is_empty());
    }

    #[test]
    fn invalidate_clears_storage_until_revalidated() {
        let registry = ObjectRegistry::new();
        insert_service(&registry, "web1-http", "web1");

        let cache = ServiceCache::new();
        assert_eq!(cache.services_for(&registry, "web1").len(), 1);

        cache.invalidate();
        assert!(!cache.is_valid());
        assert_eq!(cache.stored_len("web1"), 0);

        // Next read rebuilds in full.
        assert_eq!(cache.services_for(&registry, "web1").len(), 1);
        assert!(cache.is_valid());
    }

    #[test]
    fn dead_entries_are_skipped_without_pruning() {
        let registry = ObjectRegistry::new();
        insert_service(&registry, "web1-http", "web1");
        insert_service(&registry, "web1-ssh", "web1");

        let cache = ServiceCache::new();
        cache.validate(&registry);

        // Destroy one service without touching the cache.
        drop(registry.remove_service("web1-ssh"));

        let live = cache.services_for(&registry, "web1");
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].name(), "web1-http");
        // Storage still holds the stale slot until the next rebuild.
        assert_eq!(cache.stored_len("web1"), 2);
    }
}
