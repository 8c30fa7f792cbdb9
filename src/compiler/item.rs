//! Config items and the expression builder that produces them.
//!
//! The configuration compiler front-end is an external collaborator; these
//! types model its output. A builder accumulates expressions and template
//! parents, then `compile` flattens the parents (looked up among previously
//! committed items) and applies the builder's own expressions last.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::errors::{MseError, Result};
use crate::core::values::{self, Attributes};

/// Object type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ObjectKind {
    Host,
    Service,
}

impl ObjectKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "Host",
            Self::Service => "Service",
        }
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Host" | "host" => Ok(Self::Host),
            "Service" | "service" => Ok(Self::Service),
            other => Err(format!("unknown object type '{other}'")),
        }
    }
}

/// How an expression combines with an existing attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    /// Overwrite outright.
    Set,
    /// Append-merge: arrays concatenate, dictionaries union, scalars
    /// replace.
    Append,
}

#[derive(Debug, Clone)]
struct Expression {
    attribute: String,
    op: ExprOp,
    value: Value,
}

/// A compiled configuration item: flattened attributes plus identity.
#[derive(Debug, Clone)]
pub struct ConfigItem {
    pub kind: ObjectKind,
    pub name: String,
    /// Templates register for inheritance but construct no object.
    pub is_template: bool,
    pub attrs: Attributes,
    pub parents: Vec<String>,
    /// Debug/source location, e.g. `objects.json:7`.
    pub source: String,
}

/// Index of committed items, keyed by kind and name. Template parents are
/// resolved against this.
#[derive(Debug, Default)]
pub struct ItemIndex {
    items: BTreeMap<(ObjectKind, String), ConfigItem>,
}

impl ItemIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, kind: ObjectKind, name: &str) -> Option<&ConfigItem> {
        self.items.get(&(kind, name.to_string()))
    }

    pub fn insert(&mut self, item: ConfigItem) {
        self.items.insert((item.kind, item.name.clone()), item);
    }

    pub fn remove(&mut self, kind: ObjectKind, name: &str) -> Option<ConfigItem> {
        self.items.remove(&(kind, name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Accumulates expressions and parents, then compiles into a `ConfigItem`.
#[derive(Debug, Clone)]
pub struct ConfigItemBuilder {
    kind: ObjectKind,
    name: String,
    is_template: bool,
    expressions: Vec<Expression>,
    parents: Vec<String>,
    source: String,
}

impl ConfigItemBuilder {
    #[must_use]
    pub fn new(kind: ObjectKind, name: &str, source: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            is_template: false,
            expressions: Vec::new(),
            parents: Vec::new(),
            source: source.to_string(),
        }
    }

    /// Mark the item abstract: it registers for inheritance only.
    #[must_use]
    pub fn template(mut self, is_template: bool) -> Self {
        self.is_template = is_template;
        self
    }

    pub fn add_expression(&mut self, attribute: &str, op: ExprOp, value: Value) -> &mut Self {
        self.expressions.push(Expression {
            attribute: attribute.to_string(),
            op,
            value,
        });
        self
    }

    pub fn add_parent(&mut self, name: &str) -> &mut Self {
        self.parents.push(name.to_string());
        self
    }

    /// Flatten template parents (in declaration order, earlier parents
    /// overridden by later ones) and apply this builder's expressions last.
    /// An unknown parent is a configuration error for this item alone.
    pub fn compile(&self, index: &ItemIndex) -> Result<ConfigItem> {
        let mut attrs = Attributes::new();
        for parent in &self.parents {
            let parent_item =
                index
                    .get(self.kind, parent)
                    .ok_or_else(|| MseError::UnknownTemplate {
                        item: self.name.clone(),
                        parent: parent.clone(),
                    })?;
            for (key, value) in &parent_item.attrs {
                apply(&mut attrs, key, ExprOp::Append, value.clone());
            }
        }
        for expression in &self.expressions {
            apply(
                &mut attrs,
                &expression.attribute,
                expression.op,
                expression.value.clone(),
            );
        }
        Ok(ConfigItem {
            kind: self.kind,
            name: self.name.clone(),
            is_template: self.is_template,
            attrs,
            parents: self.parents.clone(),
            source: self.source.clone(),
        })
    }
}

fn apply(attrs: &mut Attributes, attribute: &str, op: ExprOp, value: Value) {
    match op {
        ExprOp::Set => {
            attrs.insert(attribute.to_string(), value);
        }
        ExprOp::Append => {
            if let Some(existing) = attrs.get_mut(attribute) {
                values::merge_append(existing, value);
            } else {
                attrs.insert(attribute.to_string(), value);
            }
        }
    }
}

/// One message reported through the compiler's error sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub fatal: bool,
    pub message: String,
}

/// Error-reporting sink handed through commit and validation entry points.
/// A fatal error aborts the item that reported it, not the whole reload.
#[derive(Debug, Default)]
pub struct CompilerContext {
    errors: Vec<CompileError>,
}

impl CompilerContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, fatal: bool, message: impl Into<String>) {
        self.errors.push(CompileError {
            fatal,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    #[must_use]
    pub fn has_fatal(&self) -> bool {
        self.errors.iter().any(|e| e.fatal)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ConfigItemBuilder, ExprOp, ItemIndex, ObjectKind};

    #[test]
    fn set_overwrites_and_append_merges() {
        let mut builder = ConfigItemBuilder::new(ObjectKind::Service, "web1-http", "test:1");
        builder
            .add_expression("check_interval", ExprOp::Set, json!(300))
            .add_expression("check_interval", ExprOp::Set, json!(60))
            .add_expression("servicegroups", ExprOp::Append, json!(["web"]))
            .add_expression("servicegroups", ExprOp::Append, json!(["prod"]));
        let item = builder.compile(&ItemIndex::new()).unwrap();
        assert_eq!(item.attrs["check_interval"], json!(60));
        assert_eq!(item.attrs["servicegroups"], json!(["web", "prod"]));
    }

    #[test]
    fn parents_flatten_before_own_expressions() {
        let mut index = ItemIndex::new();
        let mut template = ConfigItemBuilder::new(ObjectKind::Service, "generic", "test:1");
        template
            .add_expression("check_interval", ExprOp::Set, json!(300))
            .add_expression("macros", ExprOp::Set, json!({"TIMEOUT": 30}));
        let compiled = template.template(true).compile(&index).unwrap();
        index.insert(compiled);

        let mut builder = ConfigItemBuilder::new(ObjectKind::Service, "web1-http", "test:2");
        builder.add_parent("generic");
        builder
            .add_expression("check_interval", ExprOp::Set, json!(60))
            .add_expression("macros", ExprOp::Append, json!({"PORT": 80}));
        let item = builder.compile(&index).unwrap();
        assert_eq!(item.attrs["check_interval"], json!(60));
        assert_eq!(item.attrs["macros"], json!({"TIMEOUT": 30, "PORT": 80}));
    }

    #[test]
    fn unknown_parent_is_a_configuration_error() {
        let mut builder = ConfigItemBuilder::new(ObjectKind::Service, "web1-http", "test:3");
        builder.add_parent("missing-template");
        let err = builder.compile(&ItemIndex::new()).unwrap_err();
        assert_eq!(err.code(), "MSE-1103");
    }
}
