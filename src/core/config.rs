//! Engine configuration: global flapping switches and event-log location.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{MseError, Result};

/// Process-wide engine configuration, loaded from TOML.
///
/// Per-checkable thresholds override the defaults here; the global
/// `enable_flapping` switch overrides everything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Master switch for flapping detection. When off, `is_flapping` is
    /// false for every checkable regardless of per-object settings.
    pub enable_flapping: bool,
    /// Default lower hysteresis threshold (percent) for checkables that do
    /// not configure their own.
    pub flapping_threshold_low: f64,
    /// Default upper hysteresis threshold (percent).
    pub flapping_threshold_high: f64,
    /// Optional JSONL event-log destination. `None` keeps events in memory
    /// only (or wherever the embedder routes them).
    pub event_log: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_flapping: true,
            flapping_threshold_low: 25.0,
            flapping_threshold_high: 30.0,
            event_log: None,
        }
    }
}

impl EngineConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MseError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| MseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate threshold ordering. An inverted band yields permanently- or
    /// never-flapping behavior, so it is reported rather than accepted.
    pub fn validate(&self) -> Result<()> {
        if self.flapping_threshold_low > self.flapping_threshold_high {
            return Err(MseError::Misconfiguration {
                details: format!(
                    "flapping_threshold_low ({}) must not exceed flapping_threshold_high ({})",
                    self.flapping_threshold_low, self.flapping_threshold_high
                ),
            });
        }
        if !(0.0..=200.0).contains(&self.flapping_threshold_low)
            || !(0.0..=200.0).contains(&self.flapping_threshold_high)
        {
            return Err(MseError::Misconfiguration {
                details: "flapping thresholds must be percentages in [0, 200]".to_string(),
            });
        }
        Ok(())
    }
}
