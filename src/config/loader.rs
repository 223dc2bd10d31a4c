//! JSON file loading and saving shared by settings and the checkpoint store.

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load and deserialize a JSON file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    validate_config_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!("Configuration file not found at: {}", path.display()))
        } else {
            ConfigError::IoError(e)
        }
    })?;

    serde_json::from_str(&content).map_err(ConfigError::InvalidJson)
}

/// Serialize `value` as pretty JSON and replace `path` atomically.
///
/// The document is written to a sibling `.tmp` file first and renamed into
/// place, so readers never observe a truncated file.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    validate_config_path(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(ConfigError::IoError)?;
        }
    }

    let json_content = serde_json::to_string_pretty(value).map_err(ConfigError::InvalidJson)?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json_content).map_err(ConfigError::IoError)?;
    fs::rename(&tmp_path, path).map_err(ConfigError::IoError)?;

    Ok(())
}

/// Validate config path (.json extension required).
pub fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Configuration path cannot be empty".to_string(),
        ));
    }

    match path.extension() {
        Some(ext) if ext == "json" => {}
        Some(ext) => {
            return Err(ConfigError::ValidationFailed(format!(
                "Configuration file must have .json extension, got .{}",
                ext.to_string_lossy()
            )))
        }
        None => {
            return Err(ConfigError::ValidationFailed(
                "Configuration file must have .json extension".to_string(),
            ))
        }
    }

    Ok(())
}
