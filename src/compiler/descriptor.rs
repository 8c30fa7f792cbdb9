//! Tagged service descriptors.
//!
//! A host's `services` attribute maps short service names to descriptors.
//! The shape is resolved exactly once, at parse time: a scalar is a template
//! reference, a dictionary is an override block that may redirect its
//! template parent via a `service` key. Anything else is rejected per entry.

use serde_json::Value;

use crate::compiler::item::{CompilerContext, ItemIndex, ObjectKind};
use crate::core::errors::{MseError, Result};
use crate::core::values::Attributes;

/// One parsed entry of a `services` descriptor map.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceDescriptor {
    /// Scalar entry: the value names the template parent.
    Reference(String),
    /// Dictionary entry: overrides layered after the host-level defaults.
    Override {
        /// Template parent redirect; the entry key applies when absent.
        template: Option<String>,
        /// Override expressions (macros, intervals, groups, checkers).
        attrs: Attributes,
    },
}

impl ServiceDescriptor {
    /// Resolve a raw attribute value into the tagged form. `host` and
    /// `entry` name the owner for error reporting only.
    pub fn parse(host: &str, entry: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(name) if !name.is_empty() => Ok(Self::Reference(name.clone())),
            Value::Object(map) => {
                let template = match map.get("service") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(name)) if !name.is_empty() => Some(name.clone()),
                    Some(other) => {
                        return Err(MseError::InvalidDescriptor {
                            host: host.to_string(),
                            service: entry.to_string(),
                            details: format!("'service' redirect must be a name, got {other}"),
                        });
                    }
                };
                Ok(Self::Override {
                    template,
                    attrs: map.clone(),
                })
            }
            other => Err(MseError::InvalidDescriptor {
                host: host.to_string(),
                service: entry.to_string(),
                details: format!(
                    "service description must be either a string or a dictionary, got {other}"
                ),
            }),
        }
    }

    /// Template parent for this entry: the redirect when present, the
    /// entry's own key otherwise.
    #[must_use]
    pub fn template_for<'a>(&'a self, entry: &'a str) -> &'a str {
        match self {
            Self::Reference(name) => name,
            Self::Override {
                template: Some(name),
                ..
            } => name,
            Self::Override { template: None, .. } => entry,
        }
    }

    /// Override attributes, empty for plain references.
    #[must_use]
    pub fn attrs(&self) -> Option<&Attributes> {
        match self {
            Self::Reference(_) => None,
            Self::Override { attrs, .. } => Some(attrs),
        }
    }
}

/// Validation entry point for a services dictionary: report (non-fatally)
/// every descriptor whose template parent does not resolve to a known
/// service item. Descriptors of invalid shape are skipped here — commit
/// rejects them with their own error.
pub fn validate_service_dictionary(
    ctx: &mut CompilerContext,
    index: &ItemIndex,
    location: &str,
    attrs: &Attributes,
) {
    for (entry, value) in attrs {
        let name = match value {
            Value::String(name) if !name.is_empty() => name.clone(),
            Value::Object(map) => match map.get("service") {
                Some(Value::String(name)) if !name.is_empty() => name.clone(),
                _ => entry.clone(),
            },
            _ => continue,
        };
        if index.get(ObjectKind::Service, &name).is_none() {
            ctx.add_error(
                false,
                format!("Validation failed for {location}: Service '{name}' not found."),
            );
        }
    }
}
