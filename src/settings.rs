//! Settings stores backing [`ConfigReader`].
//!
//! `JsonFileSettings` is what the binary uses: a flat JSON object on disk
//! that can be re-read on demand. `MemorySettings` is for embedding the
//! controller in another application and for tests.

use crate::config::ConfigReader;
use crate::error::Result;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Current layout version of the settings file.
pub const SETTINGS_VERSION: u64 = 1;

const VERSION_KEY: &str = "settings_version";

/// Settings read from a flat JSON object file.
pub struct JsonFileSettings {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
}

impl JsonFileSettings {
    /// Read the file at `path`. A missing file yields empty settings so
    /// every key falls back to its default.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = Self::read(&path)?;
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Default settings location: `<config dir>/psucontrol-mqtt/settings.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("psucontrol-mqtt")
            .join("settings.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file. On error the previously loaded values are kept.
    pub fn reload(&self) -> Result<()> {
        let values = Self::read(&self.path)?;
        *self.values.write() = values;
        Ok(())
    }

    fn read(path: &Path) -> Result<Map<String, Value>> {
        if !path.exists() {
            log::warn!(
                "[PSU] Settings file {} not found, using defaults",
                path.display()
            );
            return Ok(Map::new());
        }

        let content = fs::read_to_string(path)?;
        let values: Map<String, Value> = serde_json::from_str(&content)?;

        match values.get(VERSION_KEY).and_then(Value::as_u64) {
            Some(version) if version > SETTINGS_VERSION => log::warn!(
                "[PSU] Settings file version {} is newer than supported version {}",
                version,
                SETTINGS_VERSION
            ),
            Some(_) => {}
            None => log::debug!("[PSU] Settings file has no {}", VERSION_KEY),
        }

        Ok(values)
    }
}

impl ConfigReader for JsonFileSettings {
    fn get_string(&self, key: &str) -> Option<String> {
        match self.values.read().get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => {
                log::warn!("[PSU] Setting {} is not a string: {}", key, other);
                None
            }
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.read().get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            Value::Null => None,
            other => {
                log::warn!("[PSU] Setting {} is not a boolean: {}", key, other);
                None
            }
        }
    }
}

#[derive(Debug, Clone)]
enum SettingValue {
    String(String),
    Bool(bool),
}

/// In-memory settings store.
#[derive(Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, SettingValue>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_string(self, key: &str, value: impl Into<String>) -> Self {
        self.set_string(key, value);
        self
    }

    pub fn with_bool(self, key: &str, value: bool) -> Self {
        self.set_bool(key, value);
        self
    }

    pub fn set_string(&self, key: &str, value: impl Into<String>) {
        self.values
            .write()
            .insert(key.to_string(), SettingValue::String(value.into()));
    }

    pub fn set_bool(&self, key: &str, value: bool) {
        self.values
            .write()
            .insert(key.to_string(), SettingValue::Bool(value));
    }
}

impl ConfigReader for MemorySettings {
    fn get_string(&self, key: &str) -> Option<String> {
        match self.values.read().get(key)? {
            SettingValue::String(s) => Some(s.clone()),
            SettingValue::Bool(_) => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.read().get(key)? {
            SettingValue::Bool(b) => Some(*b),
            SettingValue::String(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, QUERY_DEVICE_STATUS, STATE_TOPIC};

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "psucontrol-mqtt-{}-{}.json",
            name,
            uuid::Uuid::new_v4().simple()
        ));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("psucontrol-mqtt-does-not-exist.json");
        let settings = JsonFileSettings::open(&path).unwrap();
        assert_eq!(ChannelConfig::load(&settings), ChannelConfig::default());
    }

    #[test]
    fn test_json_file_values() {
        let path = temp_file(
            "values",
            r#"{"settings_version": 1, "state_topic": "psu/state", "query_device_status": true, "on_command": 1}"#,
        );
        let settings = JsonFileSettings::open(&path).unwrap();

        assert_eq!(settings.get_string(STATE_TOPIC).as_deref(), Some("psu/state"));
        assert_eq!(settings.get_bool(QUERY_DEVICE_STATUS), Some(true));
        // Non-string value falls back to the default
        assert_eq!(settings.get_string("on_command"), None);
        assert_eq!(settings.get_string("missing"), None);

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let path = temp_file("reload", r#"{"state_topic": "old/state"}"#);
        let settings = JsonFileSettings::open(&path).unwrap();
        assert_eq!(settings.get_string(STATE_TOPIC).as_deref(), Some("old/state"));

        fs::write(&path, r#"{"state_topic": "new/state"}"#).unwrap();
        settings.reload().unwrap();
        assert_eq!(settings.get_string(STATE_TOPIC).as_deref(), Some("new/state"));

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_reload_keeps_values_on_parse_error() {
        let path = temp_file("broken", r#"{"state_topic": "psu/state"}"#);
        let settings = JsonFileSettings::open(&path).unwrap();

        fs::write(&path, "{not json").unwrap();
        assert!(settings.reload().is_err());
        assert_eq!(settings.get_string(STATE_TOPIC).as_deref(), Some("psu/state"));

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_memory_settings_type_mismatch() {
        let settings = MemorySettings::new()
            .with_string(STATE_TOPIC, "psu/state")
            .with_bool(QUERY_DEVICE_STATUS, true);
        assert_eq!(settings.get_bool(STATE_TOPIC), None);
        assert_eq!(settings.get_string(QUERY_DEVICE_STATUS), None);
    }
}
