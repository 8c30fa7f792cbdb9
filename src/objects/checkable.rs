//! State shared by every monitored entity, host or service.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::downtimes::{CommentRecord, DowntimeRecord};
use crate::core::config::EngineConfig;
use crate::core::errors::{MseError, Result};
use crate::core::values::{self, Attributes};
use crate::engine::flapping::FlappingHistory;
use crate::objects::host::Host;
use crate::objects::service::Service;

/// Service-scale monitoring state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Ok,
    Warning,
    Critical,
    #[default]
    Unknown,
}

impl CheckState {
    /// Ok and Warning count as a working dependency; everything else is a
    /// confirmed problem once hard.
    #[must_use]
    pub const fn is_problem(self) -> bool {
        !matches!(self, Self::Ok | Self::Warning)
    }

    /// Lowercase label for logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

/// Host liveness as reported by host-targeted checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    #[default]
    Up,
    Down,
}

impl HostState {
    /// Lowercase label for logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Whether a state is still being retried (soft) or confirmed (hard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    Soft,
    #[default]
    Hard,
}

/// Problem acknowledgement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acknowledgement {
    #[default]
    None,
    Normal,
    Sticky,
}

impl Acknowledgement {
    /// Parse the attribute encoding: the wire uses small integers, hand
    /// written configs use names.
    pub fn parse(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Self::None),
                Some(1) => Ok(Self::Normal),
                Some(2) => Ok(Self::Sticky),
                _ => Err(MseError::InvalidAttribute {
                    object: String::new(),
                    attribute: "acknowledgement",
                    details: format!("unknown acknowledgement code {n}"),
                }),
            },
            serde_json::Value::String(s) => match s.as_str() {
                "none" => Ok(Self::None),
                "normal" => Ok(Self::Normal),
                "sticky" => Ok(Self::Sticky),
                other => Err(MseError::InvalidAttribute {
                    object: String::new(),
                    attribute: "acknowledgement",
                    details: format!("unknown acknowledgement '{other}'"),
                }),
            },
            other => Err(MseError::InvalidAttribute {
                object: String::new(),
                attribute: "acknowledgement",
                details: format!("expected number or string, got {other}"),
            }),
        }
    }
}

/// Result of one completed check execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub executed_at: DateTime<Utc>,
    pub output: Option<String>,
}

/// Mutable monitoring state common to hosts and services. Always accessed
/// under the owning object's mutex so read-modify-write groups stay atomic.
#[derive(Debug, Clone, Default)]
pub struct CheckableState {
    pub state_type: StateType,
    pub last_check_result: Option<CheckResult>,
    pub flapping: FlappingHistory,
    pub enable_flapping: bool,
    pub flapping_threshold_low: Option<f64>,
    pub flapping_threshold_high: Option<f64>,
    pub acknowledgement: Acknowledgement,
    pub acknowledgement_expiry: Option<DateTime<Utc>>,
    pub downtimes: BTreeMap<u64, DowntimeRecord>,
    pub comments: BTreeMap<u64, CommentRecord>,
}

impl CheckableState {
    /// Fresh state for a newly committed object.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enable_flapping: true,
            ..Self::default()
        }
    }

    /// Apply the checkable-level config attributes.
    pub fn apply_attributes(&mut self, object: &str, attrs: &Attributes) -> Result<()> {
        if let Some(enabled) = values::get_bool(attrs, "enable_flapping") {
            self.enable_flapping = enabled;
        }
        self.flapping_threshold_low = values::get_f64(attrs, "flapping_threshold_low");
        self.flapping_threshold_high = values::get_f64(attrs, "flapping_threshold_high");

        if let Some(value) = attrs.get("acknowledgement") {
            self.acknowledgement =
                Acknowledgement::parse(value).map_err(|err| with_object(err, object))?;
        }
        if let Some(expiry) = values::get_f64(attrs, "acknowledgement_expiry") {
            self.acknowledgement_expiry = parse_expiry(object, expiry)?;
        }
        Ok(())
    }

    /// Hysteresis thresholds, falling back to the engine defaults.
    #[must_use]
    pub fn thresholds(&self, config: &EngineConfig) -> (f64, f64) {
        (
            self.flapping_threshold_low
                .unwrap_or(config.flapping_threshold_low),
            self.flapping_threshold_high
                .unwrap_or(config.flapping_threshold_high),
        )
    }
}

fn with_object(err: MseError, object: &str) -> MseError {
    match err {
        MseError::InvalidAttribute {
            attribute, details, ..
        } => MseError::InvalidAttribute {
            object: object.to_string(),
            attribute,
            details,
        },
        other => other,
    }
}

/// Expiry attribute encoding: unix seconds, 0 = never expires.
fn parse_expiry(object: &str, seconds: f64) -> Result<Option<DateTime<Utc>>> {
    if seconds == 0.0 {
        return Ok(None);
    }
    #[allow(clippy::cast_possible_truncation)]
    let whole_seconds = seconds as i64;
    Utc.timestamp_opt(whole_seconds, 0)
        .single()
        .map(Some)
        .ok_or_else(|| MseError::InvalidAttribute {
            object: object.to_string(),
            attribute: "acknowledgement_expiry",
            details: format!("{seconds} is not a valid unix timestamp"),
        })
}

/// Handle to either concrete checkable variant.
#[derive(Clone)]
pub enum CheckableRef {
    Host(Arc<Host>),
    Service(Arc<Service>),
}

impl CheckableRef {
    /// Unique object name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Host(host) => host.name(),
            Self::Service(service) => service.name(),
        }
    }

    /// Type tag for log records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Host(_) => "host",
            Self::Service(_) => "service",
        }
    }

    /// Run `f` against the shared state block under the object's mutex.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut CheckableState) -> R) -> R {
        match self {
            Self::Host(host) => f(&mut host.lock().checkable),
            Self::Service(service) => f(&mut service.lock().checkable),
        }
    }
}
