//! Dependency resolution and aggregate reachability.
//!
//! Parent failures only count once confirmed: pending parents (never
//! checked) and soft states are ignored. Dangling dependency names are
//! configuration integrity problems and propagate as NotFound errors
//! instead of being skipped.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::errors::{MseError, Result};
use crate::engine::MonitorCore;
use crate::objects::checkable::{HostState, StateType};
use crate::objects::host::Host;
use crate::objects::service::Service;

impl MonitorCore {
    /// Two-step service name resolution: the host-qualified
    /// `<hostname>-<name>` wins when it exists, otherwise `name` is taken
    /// as a fully-qualified service name.
    pub fn resolve_service(&self, host: &Host, name: &str) -> Result<Arc<Service>> {
        let combined = format!("{}-{}", host.name(), name);
        if let Some(service) = self.registry().service(&combined) {
            return Ok(service);
        }
        self.registry().expect_service(name)
    }

    /// Hosts named by the host's dependency map. A host listed as its own
    /// dependency is skipped, not an error.
    pub fn parent_hosts(&self, host: &Host) -> Result<Vec<Arc<Host>>> {
        let keys: Vec<String> = host.lock().host_dependencies.keys().cloned().collect();
        let mut parents = Vec::with_capacity(keys.len());
        for key in keys {
            if key == host.name() {
                continue;
            }
            parents.push(self.registry().expect_host(&key)?);
        }
        Ok(parents)
    }

    /// Services named by the host's service-dependency map, resolved
    /// co-located-first.
    pub fn parent_services(&self, host: &Host) -> Result<Vec<Arc<Service>>> {
        let keys: Vec<String> = host.lock().service_dependencies.keys().cloned().collect();
        keys.iter()
            .map(|key| self.resolve_service(host, key))
            .collect()
    }

    /// Whether the host can be reached through its dependency graph.
    ///
    /// Unreachable when any parent service is in a confirmed (hard,
    /// checked) problem state, or when any parent host is down or itself
    /// unreachable. Cycles beyond direct self-reference fail with a
    /// dependency-cycle error.
    pub fn is_reachable(&self, host: &Arc<Host>) -> Result<bool> {
        let mut path = BTreeSet::new();
        self.reachable_guarded(host, &mut path)
    }

    fn reachable_guarded(&self, host: &Arc<Host>, path: &mut BTreeSet<String>) -> Result<bool> {
        if !path.insert(host.name().to_string()) {
            return Err(MseError::DependencyCycle {
                host: host.name().to_string(),
            });
        }
        let result = self.reachable_eval(host, path);
        path.remove(host.name());
        result
    }

    fn reachable_eval(&self, host: &Arc<Host>, path: &mut BTreeSet<String>) -> Result<bool> {
        for service in self.parent_services(host)? {
            let inner = service.lock();
            // Pending parents have proven nothing yet.
            if inner.checkable.last_check_result.is_none() {
                continue;
            }
            // Soft states are still retrying.
            if inner.checkable.state_type == StateType::Soft {
                continue;
            }
            if !inner.state.is_problem() {
                continue;
            }
            return Ok(false);
        }
        for parent in self.parent_hosts(host)? {
            if !self.is_up(&parent)? {
                return Ok(false);
            }
            if !self.reachable_guarded(&parent, path)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Host liveness. With a `hostchecks` list, the host is up while every
    /// resolved entry that survives dependency filtering and has completed
    /// a check reports Ok or Warning. Without one, the passive host state
    /// decides.
    pub fn is_up(&self, host: &Arc<Host>) -> Result<bool> {
        let (hostchecks, passive) = {
            let inner = host.lock();
            (inner.hostchecks.clone(), inner.state)
        };
        if hostchecks.is_empty() {
            return Ok(passive == HostState::Up);
        }
        for name in hostchecks {
            let service = self.resolve_service(host, &name)?;
            // An entry whose own ancestors are down is already accounted
            // for upstream.
            if self.excluded_by_dependencies(host, &service)? {
                continue;
            }
            let inner = service.lock();
            if inner.checkable.last_check_result.is_none() {
                continue;
            }
            if inner.state.is_problem() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Host state derived from `is_up`.
    pub fn host_state(&self, host: &Arc<Host>) -> Result<HostState> {
        Ok(if self.is_up(host)? {
            HostState::Up
        } else {
            HostState::Down
        })
    }

    /// The single designated host-check service, when configured.
    pub fn host_check_service(&self, host: &Host) -> Result<Option<Arc<Service>>> {
        let name = host.lock().hostcheck.clone();
        match name {
            Some(name) => Ok(Some(self.resolve_service(host, &name)?)),
            None => Ok(None),
        }
    }

    /// Service-level dependency filter: true when any service named in the
    /// entry's own dependency list is in a confirmed problem state.
    fn excluded_by_dependencies(&self, host: &Host, service: &Arc<Service>) -> Result<bool> {
        let dependencies = service.lock().dependencies.clone();
        for name in dependencies {
            let dependency = self.resolve_service(host, &name)?;
            let inner = dependency.lock();
            if inner.checkable.last_check_result.is_some()
                && inner.checkable.state_type == StateType::Hard
                && inner.state.is_problem()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::json;

    use crate::core::config::EngineConfig;
    use crate::engine::MonitorCore;
    use crate::objects::checkable::{CheckResult, CheckState, StateType};
    use crate::objects::host::Host;
    use crate::objects::service::Service;

    fn core() -> MonitorCore {
        MonitorCore::with_sink(
            EngineConfig::default(),
            Arc::new(crate::logger::NullSink),
        )
    }

    fn add_host(core: &MonitorCore, name: &str, attrs: serde_json::Value) -> Arc<Host> {
        let attrs = attrs.as_object().cloned().unwrap();
        let host = Arc::new(Host::from_attributes(name, &attrs).unwrap());
        core.registry().insert_host(host.clone());
        host
    }

    fn add_service(core: &MonitorCore, name: &str, host: &str) -> Arc<Service> {
        let attrs = json!({"host_name": host}).as_object().cloned().unwrap();
        let service = Arc::new(Service::from_attributes(name, &attrs).unwrap());
        core.registry().insert_service(service.clone());
        service
    }

    fn set_state(service: &Service, state: CheckState, state_type: StateType, checked: bool) {
        let mut inner = service.lock();
        inner.state = state;
        inner.checkable.state_type = state_type;
        inner.checkable.last_check_result = checked.then(|| CheckResult {
            executed_at: Utc::now(),
            output: None,
        });
    }

    #[test]
    fn host_without_dependencies_is_reachable() {
        let core = core();
        let host = add_host(&core, "web1", json!({}));
        assert!(core.is_reachable(&host).unwrap());
    }

    #[test]
    fn hard_critical_parent_service_blocks_reachability() {
        let core = core();
        let host = add_host(&core, "web1", json!({"servicedependencies": ["db"]}));
        let db = add_service(&core, "db", "db1");
        set_state(&db, CheckState::Critical, StateType::Hard, true);
        assert!(!core.is_reachable(&host).unwrap());
    }

    #[test]
    fn pending_and_soft_parents_are_ignored() {
        let core = core();
        let host = add_host(&core, "web1", json!({"servicedependencies": ["db"]}));
        let db = add_service(&core, "db", "db1");

        // Pending: critical but never checked.
        set_state(&db, CheckState::Critical, StateType::Hard, false);
        assert!(core.is_reachable(&host).unwrap());

        // Soft: still retrying.
        set_state(&db, CheckState::Critical, StateType::Soft, true);
        assert!(core.is_reachable(&host).unwrap());

        // Warning is not a problem state.
        set_state(&db, CheckState::Warning, StateType::Hard, true);
        assert!(core.is_reachable(&host).unwrap());
    }

    #[test]
    fn co_located_service_shadows_global_name() {
        let core = core();
        let host = add_host(&core, "web1", json!({}));
        add_service(&core, "ping", "other");
        let local = add_service(&core, "web1-ping", "web1");

        let resolved = core.resolve_service(&host, "ping").unwrap();
        assert_eq!(resolved.name(), local.name());
    }

    #[test]
    fn resolution_falls_back_to_global_name() {
        let core = core();
        let host = add_host(&core, "web1", json!({}));
        add_service(&core, "ping", "other");
        let resolved = core.resolve_service(&host, "ping").unwrap();
        assert_eq!(resolved.name(), "ping");
    }

    #[test]
    fn dangling_dependency_surfaces_not_found() {
        let core = core();
        let host = add_host(&core, "web1", json!({"servicedependencies": ["ghost"]}));
        let err = core.is_reachable(&host).unwrap_err();
        assert_eq!(err.code(), "MSE-2002");
    }

    #[test]
    fn self_dependency_is_skipped() {
        let core = core();
        let host = add_host(&core, "web1", json!({"hostdependencies": ["web1"]}));
        assert!(core.is_reachable(&host).unwrap());
    }

    #[test]
    fn down_parent_host_blocks_reachability() {
        let core = core();
        let host = add_host(&core, "web1", json!({"hostdependencies": ["gw"]}));
        let gw = add_host(&core, "gw", json!({"hostchecks": ["gw-ping"]}));
        let ping = add_service(&core, "gw-ping", "gw");
        set_state(&ping, CheckState::Critical, StateType::Hard, true);

        assert!(!core.is_up(&gw).unwrap());
        assert!(!core.is_reachable(&host).unwrap());
    }

    #[test]
    fn two_host_cycle_is_detected() {
        let core = core();
        let a = add_host(&core, "a", json!({"hostdependencies": ["b"]}));
        add_host(&core, "b", json!({"hostdependencies": ["a"]}));
        let err = core.is_reachable(&a).unwrap_err();
        assert_eq!(err.code(), "MSE-2101");
    }

    #[test]
    fn diamond_dependencies_are_not_a_cycle() {
        let core = core();
        let a = add_host(&core, "a", json!({"hostdependencies": ["b", "c"]}));
        add_host(&core, "b", json!({"hostdependencies": ["d"]}));
        add_host(&core, "c", json!({"hostdependencies": ["d"]}));
        add_host(&core, "d", json!({}));
        assert!(core.is_reachable(&a).unwrap());
    }

    #[test]
    fn hostcheck_excluded_by_failed_dependency_is_not_counted() {
        let core = core();
        let host = add_host(&core, "web1", json!({"hostchecks": ["ping"]}));

        let attrs = json!({"host_name": "web1", "dependencies": ["upstream"]})
            .as_object()
            .cloned()
            .unwrap();
        let ping = Arc::new(Service::from_attributes("web1-ping", &attrs).unwrap());
        core.registry().insert_service(ping.clone());
        set_state(&ping, CheckState::Critical, StateType::Hard, true);

        let upstream = add_service(&core, "upstream", "net");
        set_state(&upstream, CheckState::Critical, StateType::Hard, true);

        // ping is critical but its upstream dependency already failed, so
        // the entry is excluded and the host stays up.
        assert!(core.is_up(&host).unwrap());
    }

    #[test]
    fn pending_hostcheck_is_optimistically_up() {
        let core = core();
        let host = add_host(&core, "web1", json!({"hostchecks": ["ping"]}));
        add_service(&core, "web1-ping", "web1");
        assert!(core.is_up(&host).unwrap());
    }

    #[test]
    fn hostcheck_accessor_resolves_single_service() {
        let core = core();
        let host = add_host(&core, "web1", json!({"hostcheck": "ping"}));
        let ping = add_service(&core, "web1-ping", "web1");
        let resolved = core.host_check_service(&host).unwrap().unwrap();
        assert_eq!(resolved.name(), ping.name());

        let bare = add_host(&core, "db1", json!({}));
        assert!(core.host_check_service(&bare).unwrap().is_none());
    }
}
