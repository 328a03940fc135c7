//! Configuration loading and management
//!
//! Handles parsing of `tasktrack.toml` in the data directory.

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::clock::SystemClock;
use crate::criteria::{FilterCriteria, SortOption};
use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE: &str = "tasktrack.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Initial view criteria
    #[serde(default)]
    pub view: ViewConfig,

    /// Time source configuration
    #[serde(default)]
    pub clock: ClockConfig,
}

/// Storage-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Slot the task collection is stored under
    #[serde(default = "default_slot")]
    pub slot: String,

    /// How long to wait for the slot lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_slot() -> String {
    "tasks".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            slot: default_slot(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Criteria applied when a store opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Default sort option
    #[serde(default)]
    pub sort: SortOption,

    /// Whether completed tasks are shown
    #[serde(default = "default_true")]
    pub show_completed: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            sort: SortOption::default(),
            show_completed: default_true(),
        }
    }
}

impl ViewConfig {
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            sort_option: self.sort,
            show_completed: self.show_completed,
            ..FilterCriteria::default()
        }
    }
}

/// Clock configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Offset from UTC used for "today"; the machine's local offset if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
}

impl ClockConfig {
    pub fn offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .and_then(|minutes| minutes.checked_mul(60))
            .and_then(FixedOffset::east_opt)
    }

    pub fn system_clock(&self) -> SystemClock {
        match self.offset() {
            Some(offset) => SystemClock::with_offset(offset),
            None => SystemClock::local(),
        }
    }
}

impl Config {
    /// Load configuration from a `tasktrack.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data directory, or return defaults
    pub fn load_from_dir(data_dir: &Path) -> Self {
        let config_path = Self::path_in(data_dir);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %err,
                    "ignoring invalid configuration"
                );
                Self::default()
            }
        }
    }

    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let slot = self.storage.slot.as_str();
        if slot.is_empty()
            || !slot
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(Error::InvalidConfig(format!(
                "storage.slot '{slot}' must be non-empty and use letters, digits, '-' or '_'"
            )));
        }
        if self.storage.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "storage.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if let Some(minutes) = self.clock.utc_offset_minutes {
            if self.clock.offset().is_none() {
                return Err(Error::InvalidConfig(format!(
                    "clock.utc_offset_minutes {minutes} is out of range"
                )));
            }
        }
        Ok(())
    }
}
