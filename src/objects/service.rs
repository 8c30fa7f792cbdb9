//! Service objects.

#![allow(missing_docs)]

use parking_lot::{Mutex, MutexGuard};

use crate::core::errors::{MseError, Result};
use crate::core::values::{self, Attributes};
use crate::objects::checkable::{CheckState, CheckableState};

/// A monitored service, always belonging to one host by name.
pub struct Service {
    name: String,
    host_name: String,
    inner: Mutex<ServiceInner>,
}

/// Mutable service state.
pub struct ServiceInner {
    pub alias: Option<String>,
    pub state: CheckState,
    pub check_interval: Option<f64>,
    pub retry_interval: Option<f64>,
    pub servicegroups: Vec<String>,
    pub checkers: Vec<String>,
    pub macros: Attributes,
    /// Names of services this service depends on, resolved through the
    /// owning host's namespace when evaluating host checks.
    pub dependencies: Vec<String>,
    pub checkable: CheckableState,
}

impl Service {
    /// Construct a service from a committed item's flattened attributes.
    /// `host_name` is mandatory; derived items always carry it.
    pub fn from_attributes(name: &str, attrs: &Attributes) -> Result<Self> {
        let host_name = values::get_str(attrs, "host_name")
            .ok_or_else(|| MseError::InvalidAttribute {
                object: name.to_string(),
                attribute: "host_name",
                details: "service items must name their host".to_string(),
            })?
            .to_string();

        let mut checkable = CheckableState::new();
        checkable.apply_attributes(name, attrs)?;

        let inner = ServiceInner {
            alias: values::get_str(attrs, "alias").map(str::to_string),
            state: CheckState::Unknown,
            check_interval: values::get_f64(attrs, "check_interval"),
            retry_interval: values::get_f64(attrs, "retry_interval"),
            servicegroups: values::get_string_list(attrs, "servicegroups"),
            checkers: values::get_string_list(attrs, "checkers"),
            macros: values::get_object(attrs, "macros").cloned().unwrap_or_default(),
            dependencies: values::get_string_list(attrs, "dependencies"),
            checkable,
        };
        Ok(Self {
            name: name.to_string(),
            host_name,
            inner: Mutex::new(inner),
        })
    }

    /// Unique service name (derived services use `<host>-<short name>`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning host.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Display alias, falling back to the name.
    #[must_use]
    pub fn alias(&self) -> String {
        self.inner
            .lock()
            .alias
            .clone()
            .unwrap_or_else(|| self.name.clone())
    }

    /// Lock the mutable state.
    pub fn lock(&self) -> MutexGuard<'_, ServiceInner> {
        self.inner.lock()
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("host", &self.host_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Service;
    use crate::objects::checkable::CheckState;

    #[test]
    fn service_requires_host_name() {
        let attrs = json!({}).as_object().cloned().unwrap();
        let err = Service::from_attributes("web1-http", &attrs).unwrap_err();
        assert_eq!(err.code(), "MSE-1102");
    }

    #[test]
    fn fresh_services_are_pending_unknown() {
        let attrs = json!({"host_name": "web1", "check_interval": 60.0})
            .as_object()
            .cloned()
            .unwrap();
        let service = Service::from_attributes("web1-http", &attrs).unwrap();
        assert_eq!(service.host_name(), "web1");
        let inner = service.lock();
        assert_eq!(inner.state, CheckState::Unknown);
        assert!(inner.checkable.last_check_result.is_none());
        assert_eq!(inner.check_interval, Some(60.0));
    }
}
