//! Configuration module for Backup Gate.
//!
//! # Module Structure
//!
//! - `loader`: JSON file load/save helpers (atomic replace on save)
//! - `store`: the persisted checkpoint document and legacy migration
//!
//! # Settings Management
//!
//! `SettingsManager` loads `GateSettings` from `config/settings.json`:
//! - a missing file yields defaults
//! - an unparsable file logs a warning and yields defaults
//! - values are validated before use

pub mod loader;
pub mod store;

use crate::error::ConfigError;
use crate::probe::{ProbeConfig, DEFAULT_QUERY_TEMPLATE};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.json";

/// Upper bound for a single probe's wait.
const MAX_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Runtime settings for the gate.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GateSettings {
    // Probe
    pub probe_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub block_info_command: String,

    // Bridge
    pub poll_interval_ms: u64,
    pub bounded_window_secs: u64,
    pub entry_point: String,

    // Command surface
    pub command_prefix: String,

    // Files
    pub checkpoint_file: String,

    // Server process
    pub server_command: Vec<String>,
    pub server_dir: String,
    pub backup_command: Vec<String>,

    // Debug Settings
    pub debug_logging: bool,
}

impl Default for GateSettings {
    fn default() -> Self {
        GateSettings {
            probe_timeout_ms: 400,
            settle_delay_ms: 200,
            block_info_command: DEFAULT_QUERY_TEMPLATE.to_string(),
            poll_interval_ms: 100,
            bounded_window_secs: 5,
            entry_point: "make".to_string(),
            command_prefix: "!!pb".to_string(),
            checkpoint_file: "config/check_point.json".to_string(),
            server_command: vec![
                "java".to_string(),
                "-jar".to_string(),
                "server.jar".to_string(),
                "nogui".to_string(),
            ],
            server_dir: "server".to_string(),
            backup_command: Vec::new(),
            debug_logging: false,
        }
    }
}

impl GateSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_timeout_ms == 0 || self.probe_timeout_ms > MAX_PROBE_TIMEOUT_MS {
            return Err(ConfigError::ValidationFailed(format!(
                "probe_timeout_ms must be between 1 and {}, got {}",
                MAX_PROBE_TIMEOUT_MS, self.probe_timeout_ms
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll_interval_ms must be positive".to_string()));
        }
        for placeholder in ["{x}", "{y}", "{z}", "{world}"] {
            if !self.block_info_command.contains(placeholder) {
                return Err(ConfigError::ValidationFailed(format!(
                    "block_info_command is missing {}",
                    placeholder
                )));
            }
        }
        if self.command_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("command_prefix must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            timeout: Duration::from_millis(self.probe_timeout_ms),
            query_template: self.block_info_command.clone(),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn bounded_window(&self) -> Duration {
        Duration::from_secs(self.bounded_window_secs)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        PathBuf::from(&self.checkpoint_file)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.debug_logging {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}

/// Settings persistence
pub struct SettingsManager;

impl SettingsManager {
    /// Load settings from `config/settings.json`.
    pub fn load() -> Result<GateSettings, ConfigError> {
        Self::load_from(Path::new(DEFAULT_SETTINGS_PATH))
    }

    /// Load settings from `path`, or return defaults if it doesn't exist.
    ///
    /// A file that fails to parse falls back to defaults with a warning;
    /// parsed settings that fail validation are an error.
    pub fn load_from(path: &Path) -> Result<GateSettings, ConfigError> {
        let settings = match loader::load_json::<GateSettings>(path) {
            Ok(settings) => settings,
            Err(ConfigError::FileNotFound(_)) => GateSettings::default(),
            Err(ConfigError::InvalidJson(e)) => {
                log::warn!("[Config] Failed to parse {}, falling back to defaults: {}", path.display(), e);
                GateSettings::default()
            }
            Err(e) => return Err(e),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(settings: &GateSettings) -> Result<(), ConfigError> {
        Self::save_to(settings, Path::new(DEFAULT_SETTINGS_PATH))
    }

    pub fn save_to(settings: &GateSettings, path: &Path) -> Result<(), ConfigError> {
        settings.validate()?;
        loader::save_json(settings, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GateSettings::default().validate().is_ok());
    }

    #[test]
    fn test_template_without_world_is_rejected() {
        let settings = GateSettings {
            block_info_command: "info block {x} {y} {z}".to_string(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"probe_timeout_ms": 800}"#).unwrap();
        let settings = SettingsManager::load_from(&path).unwrap();
        assert_eq!(settings.probe_timeout_ms, 800);
        assert_eq!(settings.entry_point, "make");
    }

    #[test]
    fn test_garbage_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(SettingsManager::load_from(&path).unwrap(), GateSettings::default());
    }
}
