//! Host-to-service expansion.
//!
//! Every commit of a concrete host item re-derives the services its
//! `services` descriptor map describes, then reconciles against the
//! previously generated set: present entries are re-created with fresh
//! identity, disappearing entries are individually retracted. Host removal
//! retracts everything unconditionally.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use crate::compiler::descriptor::ServiceDescriptor;
use crate::compiler::item::{CompilerContext, ConfigItem, ConfigItemBuilder, ExprOp, ObjectKind};
use crate::core::errors::Result;
use crate::core::values::{self, Attributes};
use crate::engine::MonitorCore;
use crate::logger::StateEventKind;

/// Attribute/operator table shared by host-level defaults and descriptor
/// overrides: macros and servicegroups accumulate, the rest overwrite.
fn copy_service_attributes(builder: &mut ConfigItemBuilder, attrs: &Attributes) {
    if let Some(macros) = attrs.get("macros") {
        builder.add_expression("macros", ExprOp::Append, macros.clone());
    }
    if let Some(interval) = attrs.get("check_interval") {
        builder.add_expression("check_interval", ExprOp::Set, interval.clone());
    }
    if let Some(interval) = attrs.get("retry_interval") {
        builder.add_expression("retry_interval", ExprOp::Set, interval.clone());
    }
    if let Some(groups) = attrs.get("servicegroups") {
        builder.add_expression("servicegroups", ExprOp::Append, groups.clone());
    }
    if let Some(checkers) = attrs.get("checkers") {
        builder.add_expression("checkers", ExprOp::Set, checkers.clone());
    }
}

impl MonitorCore {
    /// Derive and commit the services described by a host item, then
    /// retract previously generated services missing from the new set.
    ///
    /// A descriptor of invalid shape rejects that single entry (reported to
    /// the sink); the remaining entries still commit.
    pub(crate) fn expand_host_services(
        &self,
        item: &ConfigItem,
        ctx: &mut CompilerContext,
    ) -> Result<()> {
        let host = self.registry().expect_host(&item.name)?;

        let descriptors = values::get_object(&item.attrs, "services")
            .cloned()
            .unwrap_or_default();

        let mut generated = BTreeSet::new();
        let mut parsed = BTreeMap::new();

        for (entry, raw) in &descriptors {
            let descriptor = match ServiceDescriptor::parse(&item.name, entry, raw) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    ctx.add_error(false, err.to_string());
                    continue;
                }
            };

            let derived_name = format!("{}-{}", item.name, entry);
            let mut builder =
                ConfigItemBuilder::new(ObjectKind::Service, &derived_name, &item.source);
            builder.add_expression("host_name", ExprOp::Set, json!(item.name));
            builder.add_expression("alias", ExprOp::Set, json!(entry));
            copy_service_attributes(&mut builder, &item.attrs);
            builder.add_parent(descriptor.template_for(entry));
            if let Some(overrides) = descriptor.attrs() {
                copy_service_attributes(&mut builder, overrides);
            }

            if self.commit(&builder, ctx).is_ok() {
                self.emit(
                    "service",
                    &derived_name,
                    StateEventKind::ServiceGenerated {
                        host: item.name.clone(),
                    },
                );
                generated.insert(derived_name);
                parsed.insert(entry.clone(), descriptor);
            }
        }

        let stale: Vec<String> = {
            let inner = host.lock();
            inner
                .generated_services
                .difference(&generated)
                .cloned()
                .collect()
        };
        for service_name in stale {
            self.retract_service(&service_name, &item.name);
        }

        let mut inner = host.lock();
        inner.generated_services = generated;
        inner.service_descriptors = parsed;
        Ok(())
    }

    /// Unregister one generated service: drop its item, destroy its object,
    /// and invalidate the caches that indexed it.
    pub(crate) fn retract_service(&self, service_name: &str, host_name: &str) {
        self.items().write().remove(ObjectKind::Service, service_name);
        if self.registry().remove_service(service_name).is_some() {
            self.invalidate_structural_caches();
            self.emit(
                "service",
                service_name,
                StateEventKind::ServiceRetracted {
                    host: host_name.to_string(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::compiler::item::{CompilerContext, ConfigItemBuilder, ExprOp, ObjectKind};
    use crate::core::config::EngineConfig;
    use crate::engine::MonitorCore;
    use crate::logger::StateEventKind;
    use crate::logger::memory::MemorySink;

    fn core_with_sink() -> (MonitorCore, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (
            MonitorCore::with_sink(EngineConfig::default(), sink.clone()),
            sink,
        )
    }

    fn commit_service_template(core: &MonitorCore, name: &str) {
        let mut ctx = CompilerContext::new();
        let builder = ConfigItemBuilder::new(ObjectKind::Service, name, "test:0").template(true);
        core.commit(&builder, &mut ctx).unwrap();
    }

    fn commit_host(core: &MonitorCore, name: &str, attrs: serde_json::Value) -> CompilerContext {
        let mut ctx = CompilerContext::new();
        let mut builder = ConfigItemBuilder::new(ObjectKind::Host, name, "test:1");
        for (key, value) in attrs.as_object().unwrap() {
            builder.add_expression(key, ExprOp::Set, value.clone());
        }
        let _ = core.commit(&builder, &mut ctx);
        ctx
    }

    #[test]
    fn descriptors_generate_derived_services() {
        let (core, _sink) = core_with_sink();
        commit_service_template(&core, "ping");
        commit_service_template(&core, "generic-http");

        let ctx = commit_host(
            &core,
            "web1",
            json!({
                "services": {
                    "ping": "ping",
                    "http": {"service": "generic-http", "check_interval": 30},
                },
            }),
        );
        assert!(ctx.errors().is_empty());

        let http = core.registry().expect_service("web1-http").unwrap();
        assert_eq!(http.host_name(), "web1");
        assert_eq!(http.alias(), "http");
        assert_eq!(http.lock().check_interval, Some(30.0));
        assert!(core.registry().service_exists("web1-ping"));
    }

    #[test]
    fn descriptor_overrides_layer_after_host_defaults() {
        let (core, _sink) = core_with_sink();
        commit_service_template(&core, "http");

        let ctx = commit_host(
            &core,
            "web1",
            json!({
                "macros": {"ADDRESS": "10.0.0.1", "PORT": 80},
                "check_interval": 300,
                "servicegroups": ["all"],
                "services": {
                    "http": {
                        "macros": {"PORT": 443},
                        "check_interval": 60,
                        "servicegroups": ["web"],
                    },
                },
            }),
        );
        assert!(ctx.errors().is_empty());

        let http = core.registry().expect_service("web1-http").unwrap();
        let inner = http.lock();
        assert_eq!(inner.check_interval, Some(60.0));
        assert_eq!(inner.macros.get("PORT"), Some(&json!(443)));
        assert_eq!(inner.macros.get("ADDRESS"), Some(&json!("10.0.0.1")));
        assert_eq!(inner.servicegroups, vec!["all", "web"]);
    }

    #[test]
    fn invalid_descriptor_rejects_only_that_entry() {
        let (core, _sink) = core_with_sink();
        commit_service_template(&core, "ping");

        let ctx = commit_host(
            &core,
            "web1",
            json!({"services": {"ping": "ping", "broken": 42}}),
        );
        assert_eq!(ctx.errors().len(), 1);
        assert!(ctx.errors()[0].message.contains("MSE-1101"));
        assert!(core.registry().service_exists("web1-ping"));
        assert!(!core.registry().service_exists("web1-broken"));
    }

    #[test]
    fn recommit_retracts_dropped_descriptors() {
        let (core, sink) = core_with_sink();
        commit_service_template(&core, "ping");
        commit_service_template(&core, "http");

        commit_host(
            &core,
            "web1",
            json!({"services": {"ping": "ping", "http": "http"}}),
        );
        assert!(core.registry().service_exists("web1-http"));

        commit_host(&core, "web1", json!({"services": {"ping": "ping"}}));
        assert!(!core.registry().service_exists("web1-http"));
        assert!(core.registry().service_exists("web1-ping"));

        assert!(sink.snapshot().iter().any(|e| {
            e.object == "web1-http"
                && matches!(e.kind, StateEventKind::ServiceRetracted { .. })
        }));

        // Re-adding regenerates under the same derived name.
        commit_host(
            &core,
            "web1",
            json!({"services": {"ping": "ping", "http": "http"}}),
        );
        assert!(core.registry().service_exists("web1-http"));
    }

    #[test]
    fn host_removal_retracts_every_generated_service() {
        let (core, _sink) = core_with_sink();
        commit_service_template(&core, "ping");
        commit_service_template(&core, "http");
        commit_host(
            &core,
            "web1",
            json!({"services": {"ping": "ping", "http": "http"}}),
        );
        assert_eq!(core.registry().service_count(), 2);

        core.remove(ObjectKind::Host, "web1");
        assert!(!core.registry().host_exists("web1"));
        assert_eq!(core.registry().service_count(), 0);
    }

    #[test]
    fn expansion_invalidates_the_services_cache() {
        let (core, _sink) = core_with_sink();
        commit_service_template(&core, "ping");
        commit_host(&core, "web1", json!({"services": {"ping": "ping"}}));

        // Prime the cache, then recommit and observe invalidation.
        assert_eq!(core.services_of("web1").len(), 1);
        assert!(core.service_cache().is_valid());

        commit_host(&core, "web1", json!({"services": {}}));
        assert_eq!(core.services_of("web1").len(), 0);
    }

    #[test]
    fn unknown_template_parent_rejects_the_entry() {
        let (core, _sink) = core_with_sink();
        let ctx = commit_host(&core, "web1", json!({"services": {"ping": "nowhere"}}));
        assert!(!ctx.errors().is_empty());
        assert!(ctx.errors().iter().any(|e| e.message.contains("MSE-1103")));
        assert!(!core.registry().service_exists("web1-ping"));
    }
}
