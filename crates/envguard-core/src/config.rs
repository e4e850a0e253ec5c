//! Engine configuration.
//!
//! All fields have defaults, so an empty JSON object (or no file at all) is a
//! valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::MAX_DOWNTIME_MINUTES;
use crate::slots::MAX_LOOKAHEAD_DAYS;

/// Tunables for detection, storage and slot suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Refresh window length when neither a planned end nor an estimate is given.
    pub default_downtime_minutes: i64,
    /// How far ahead slot suggestion scans.
    pub slot_lookahead_days: i64,
    /// Upper bound on suggested slots.
    pub max_suggested_slots: usize,
    /// Keep resolution decisions for (refresh, booking) pairs whose overlap is
    /// unchanged across a recompute, instead of replacing every row.
    pub preserve_resolutions: bool,
    /// SQLite busy timeout.
    pub busy_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_downtime_minutes: 60,
            slot_lookahead_days: 7,
            max_suggested_slots: 5,
            preserve_resolutions: false,
            busy_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_downtime_minutes <= 0 {
            return Err(Error::Config(
                "default_downtime_minutes must be positive".into(),
            ));
        }
        if self.default_downtime_minutes > MAX_DOWNTIME_MINUTES {
            return Err(Error::Config(format!(
                "default_downtime_minutes may not exceed {MAX_DOWNTIME_MINUTES}"
            )));
        }
        if self.slot_lookahead_days <= 0 {
            return Err(Error::Config("slot_lookahead_days must be positive".into()));
        }
        if self.slot_lookahead_days > MAX_LOOKAHEAD_DAYS {
            return Err(Error::Config(format!(
                "slot_lookahead_days may not exceed {MAX_LOOKAHEAD_DAYS}"
            )));
        }
        if self.max_suggested_slots == 0 {
            return Err(Error::Config("max_suggested_slots must be at least 1".into()));
        }
        Ok(())
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
