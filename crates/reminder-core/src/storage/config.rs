//! TOML-based application configuration.
//!
//! Stores:
//! - Notification-source API location and request timeouts
//! - Poll, long-poll and deep-check intervals
//! - Default display time and navigation gap
//! - Persistence slot name/location
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;
use crate::notification::DEFAULT_DISPLAY_SECS;

/// Notification-source API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// The server may hold a poll open this long before answering.
    #[serde(default = "default_long_poll_timeout")]
    pub long_poll_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Intervals driving the reminder service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_long_poll_backoff")]
    pub long_poll_backoff_secs: u64,
    #[serde(default = "default_deep_check_interval")]
    pub deep_check_interval_secs: u64,
    #[serde(default = "default_display_secs")]
    pub default_display_secs: u64,
    #[serde(default = "default_transition_ms")]
    pub transition_ms: u64,
}

/// Persistence slot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    /// Slot key; stored as `<data_dir>/<name>.json`.
    #[serde(default = "default_slot_name")]
    pub name: String,
    /// Explicit file path. Empty means derive from `name`.
    #[serde(default)]
    pub path: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub slot: SlotConfig,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:5000/api".into()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_long_poll_timeout() -> u64 {
    35
}
fn default_true() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    10
}
fn default_long_poll_backoff() -> u64 {
    3
}
fn default_deep_check_interval() -> u64 {
    300
}
fn default_display_secs() -> u64 {
    DEFAULT_DISPLAY_SECS
}
fn default_transition_ms() -> u64 {
    300
}
fn default_slot_name() -> String {
    "notifications".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            long_poll_timeout_secs: default_long_poll_timeout(),
            enabled: true,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            long_poll_backoff_secs: default_long_poll_backoff(),
            deep_check_interval_secs: default_deep_check_interval(),
            default_display_secs: default_display_secs(),
            transition_ms: default_transition_ms(),
        }
    }
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            name: default_slot_name(),
            path: String::new(),
        }
    }
}

const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// `TimingConfig` as durations, the form the service consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceTiming {
    pub poll_interval: Duration,
    pub long_poll_backoff: Duration,
    pub deep_check_interval: Duration,
    pub default_display: Duration,
    pub transition: Duration,
}

impl From<&TimingConfig> for ServiceTiming {
    fn from(cfg: &TimingConfig) -> Self {
        // Zero intervals would spin and tokio rejects a zero period; periods
        // near u64::MAX overflow `Instant` arithmetic.
        let bounded = |d: Duration, min: Duration| d.clamp(min, MAX_INTERVAL);
        Self {
            poll_interval: bounded(Duration::from_secs(cfg.poll_interval_secs), Duration::from_secs(1)),
            long_poll_backoff: bounded(Duration::from_secs(cfg.long_poll_backoff_secs), Duration::ZERO),
            deep_check_interval: bounded(
                Duration::from_secs(cfg.deep_check_interval_secs),
                Duration::from_secs(1),
            ),
            default_display: bounded(
                Duration::from_secs(cfg.default_display_secs),
                Duration::from_millis(100),
            ),
            transition: bounded(Duration::from_millis(cfg.transition_ms), Duration::ZERO),
        }
    }
}

impl Default for ServiceTiming {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) => return Err(invalid("cannot replace a whole section".into())),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk or return (and write) the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing the default there if missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Update a value in memory. The value must parse as the existing type.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Resolved slot file location.
    pub fn slot_path(&self) -> std::io::Result<PathBuf> {
        if !self.slot.path.trim().is_empty() {
            return Ok(PathBuf::from(self.slot.path.trim()));
        }
        Ok(data_dir()?.join(format!("{}.json", self.slot.name)))
    }

    pub fn timing(&self) -> ServiceTiming {
        ServiceTiming::from(&self.timing)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
