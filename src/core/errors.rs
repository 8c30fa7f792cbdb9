//! MSE-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::PathBuf;

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, MseError>;

/// Top-level error type for the monitor state engine.
#[derive(Debug, Error)]
pub enum MseError {
    #[error("[MSE-1001] invalid engine configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[MSE-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[MSE-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[MSE-1101] invalid service descriptor '{service}' on host '{host}': {details}")]
    InvalidDescriptor {
        host: String,
        service: String,
        details: String,
    },

    #[error("[MSE-1102] invalid value for attribute '{attribute}' on '{object}': {details}")]
    InvalidAttribute {
        object: String,
        attribute: &'static str,
        details: String,
    },

    #[error("[MSE-1103] unknown template parent '{parent}' for item '{item}'")]
    UnknownTemplate { item: String, parent: String },

    #[error("[MSE-2001] host '{name}' does not exist")]
    HostNotFound { name: String },

    #[error("[MSE-2002] service '{name}' does not exist")]
    ServiceNotFound { name: String },

    #[error("[MSE-2101] dependency cycle detected while evaluating reachability of host '{host}'")]
    DependencyCycle { host: String },

    #[error("[MSE-3001] misconfiguration: {details}")]
    Misconfiguration { details: String },

    #[error("[MSE-3101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[MSE-3102] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MseError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "MSE-1001",
            Self::MissingConfig { .. } => "MSE-1002",
            Self::ConfigParse { .. } => "MSE-1003",
            Self::InvalidDescriptor { .. } => "MSE-1101",
            Self::InvalidAttribute { .. } => "MSE-1102",
            Self::UnknownTemplate { .. } => "MSE-1103",
            Self::HostNotFound { .. } => "MSE-2001",
            Self::ServiceNotFound { .. } => "MSE-2002",
            Self::DependencyCycle { .. } => "MSE-2101",
            Self::Misconfiguration { .. } => "MSE-3001",
            Self::Serialization { .. } => "MSE-3101",
            Self::Io { .. } => "MSE-3102",
        }
    }

    /// Whether the failure is scoped to one object or config item rather
    /// than the whole process. Everything in this engine is; the predicate
    /// exists so callers can assert the taxonomy stays that way.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        true
    }

    /// Whether the error names a missing host or service.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::HostNotFound { .. } | Self::ServiceNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for MseError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for MseError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
