//! Persisted node settings
//!
//! The client hands a full [`Settings`] snapshot to a [`SettingsStore`]
//! whenever the snapshot differs from the last one written.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tally_core::{Assignment, HubAddress};
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub hub: Option<HubAddress>,
    #[serde(default)]
    pub assignment: Assignment,
}

/// Storage for [`Settings`]
pub trait SettingsStore {
    /// Load saved settings, or defaults if nothing was saved yet
    fn load(&mut self) -> Result<Settings>;

    fn save(&mut self, settings: &Settings) -> Result<()>;
}

/// JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&mut self) -> Result<Settings> {
        if !self.path.exists() {
            debug!("No settings at {}, using defaults", self.path.display());
            return Ok(Settings::default());
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&mut self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(settings)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Settings written to {}", self.path.display());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    settings: Settings,
    saves: usize,
}

/// In-memory store; clones share the same contents
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with settings, as if saved on a previous boot
    pub fn with(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner { settings, saves: 0 })),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.inner.lock().settings.clone()
    }

    /// Number of writes so far
    pub fn saves(&self) -> usize {
        self.inner.lock().saves
    }
}

impl SettingsStore for MemorySettings {
    fn load(&mut self) -> Result<Settings> {
        Ok(self.snapshot())
    }

    fn save(&mut self, settings: &Settings) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.settings = settings.clone();
        inner.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_json_shape() {
        let settings = Settings {
            device_id: Some("tally-01".to_string()),
            device_name: Some("Booth".to_string()),
            hub: Some("10.0.0.5:7411".parse().unwrap()),
            assignment: Assignment::new("cam1", "Camera 1"),
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["deviceId"], "tally-01");
        assert_eq!(json["assignment"]["sourceId"], "cam1");

        let back: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_missing_fields_default() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_json_file_store() {
        let dir = std::env::temp_dir().join(format!("tally-settings-{}", std::process::id()));
        let mut store = JsonFileStore::new(dir.join("settings.json"));
        assert_eq!(store.load().unwrap(), Settings::default());

        let settings = Settings {
            device_id: Some("tally-02".to_string()),
            ..Default::default()
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);

        let _ = fs::remove_dir_all(dir);
    }
}
