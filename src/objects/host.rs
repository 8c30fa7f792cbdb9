//! Host objects and their declarative service descriptors.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;

use crate::compiler::descriptor::ServiceDescriptor;
use crate::core::errors::Result;
use crate::core::values::{self, Attributes};
use crate::objects::checkable::{CheckableState, HostState};

/// A monitored host. Configuration and runtime state live behind one mutex;
/// the name is immutable for the object's lifetime.
pub struct Host {
    name: String,
    inner: Mutex<HostInner>,
}

/// Mutable host state.
pub struct HostInner {
    pub alias: Option<String>,
    pub hostgroups: Vec<String>,
    pub macros: Attributes,
    /// Dependency name → metadata. Only the keys drive resolution.
    pub host_dependencies: BTreeMap<String, Value>,
    pub service_dependencies: BTreeMap<String, Value>,
    /// Service names standing in as host-liveness checks.
    pub hostchecks: Vec<String>,
    /// Single designated host-check service.
    pub hostcheck: Option<String>,
    /// Parsed `services` descriptor map; invalid entries never land here.
    pub service_descriptors: BTreeMap<String, ServiceDescriptor>,
    /// Names of the services generated from the descriptor map, used for
    /// diff-based retraction on the next commit.
    pub generated_services: BTreeSet<String>,
    /// Passive state from host-targeted check events.
    pub state: HostState,
    pub checkable: CheckableState,
}

impl Host {
    /// Construct a host from a committed item's flattened attributes.
    pub fn from_attributes(name: &str, attrs: &Attributes) -> Result<Self> {
        let mut checkable = CheckableState::new();
        checkable.apply_attributes(name, attrs)?;

        let inner = HostInner {
            alias: values::get_str(attrs, "alias").map(str::to_string),
            hostgroups: values::get_string_list(attrs, "hostgroups"),
            macros: values::get_object(attrs, "macros").cloned().unwrap_or_default(),
            host_dependencies: dependency_map(attrs, "hostdependencies"),
            service_dependencies: dependency_map(attrs, "servicedependencies"),
            hostchecks: values::get_string_list(attrs, "hostchecks"),
            hostcheck: values::get_str(attrs, "hostcheck").map(str::to_string),
            service_descriptors: BTreeMap::new(),
            generated_services: BTreeSet::new(),
            state: HostState::Up,
            checkable,
        };
        Ok(Self {
            name: name.to_string(),
            inner: Mutex::new(inner),
        })
    }

    /// Unique host name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display alias, falling back to the name when unset.
    #[must_use]
    pub fn alias(&self) -> String {
        self.inner
            .lock()
            .alias
            .clone()
            .unwrap_or_else(|| self.name.clone())
    }

    /// Lock the mutable state.
    pub fn lock(&self) -> MutexGuard<'_, HostInner> {
        self.inner.lock()
    }

    /// Re-apply configuration attributes in place, preserving runtime state
    /// (flapping history, acknowledgements, downtimes, generated set).
    pub fn reconfigure(&self, attrs: &Attributes) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.checkable.apply_attributes(&self.name, attrs)?;
        inner.alias = values::get_str(attrs, "alias").map(str::to_string);
        inner.hostgroups = values::get_string_list(attrs, "hostgroups");
        inner.macros = values::get_object(attrs, "macros").cloned().unwrap_or_default();
        inner.host_dependencies = dependency_map(attrs, "hostdependencies");
        inner.service_dependencies = dependency_map(attrs, "servicedependencies");
        inner.hostchecks = values::get_string_list(attrs, "hostchecks");
        inner.hostcheck = values::get_str(attrs, "hostcheck").map(str::to_string);
        Ok(())
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").field("name", &self.name).finish()
    }
}

/// Dependency dictionaries keep their metadata values verbatim; a bare list
/// is accepted as shorthand for entries without metadata.
fn dependency_map(attrs: &Attributes, key: &str) -> BTreeMap<String, Value> {
    match attrs.get(key) {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|name| (name.to_string(), Value::Null))
            .collect(),
        _ => BTreeMap::new(),
    }
}
