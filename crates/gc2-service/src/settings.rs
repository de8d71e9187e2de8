//! Versioned application settings with forward-only migration and atomic
//! writes.
//!
//! Current schema version is 2; version-1 documents (which predate the local
//! driving-range mode) are migrated in memory on load and only rewritten when
//! the caller explicitly saves.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use openrange_physics::{Conditions, Surface};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::router::RouterMode;

/// Current settings schema version.
pub const SETTINGS_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file exists but is not valid JSON (or not our schema). The caller
    /// gets defaults in memory; the file is left untouched until an explicit
    /// save.
    #[error("malformed settings file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no home directory to resolve the settings path")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub host: String,
    pub port: u16,
    pub auto_connect: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: crate::simulator::DEFAULT_PORT,
            auto_connect: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub auto_connect: bool,
    pub reject_zero_spin: bool,
    pub use_mock: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            auto_connect: true,
            reject_zero_spin: true,
            use_mock: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenRangeSettings {
    pub conditions: Conditions,
    pub surface: Surface,
    pub show_trajectory: bool,
    pub camera_follow: bool,
}

impl Default for OpenRangeSettings {
    fn default() -> Self {
        Self {
            conditions: Conditions::default(),
            surface: Surface::Fairway,
            show_trajectory: true,
            camera_follow: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    pub mode: RouterMode,
    pub remote: RemoteSettings,
    pub device: DeviceSettings,
    /// Presentation settings; opaque to the core and preserved round-trip.
    pub ui: Value,
    pub open_range: OpenRangeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            mode: RouterMode::Remote,
            remote: RemoteSettings::default(),
            device: DeviceSettings::default(),
            ui: Value::Object(serde_json::Map::new()),
            open_range: OpenRangeSettings::default(),
        }
    }
}

impl Settings {
    /// Load from `path`. A missing file yields defaults without touching the
    /// disk; a malformed file is an error the caller can recover from with
    /// [`Settings::default`].
    pub fn load(path: &Path) -> Result<Settings, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no settings file; using defaults");
                return Ok(Settings::default());
            }
            Err(error) => return Err(error.into()),
        };

        let document: Value = serde_json::from_str(&text)?;
        let document = migrate(document);
        let settings: Settings = serde_json::from_value(document)?;
        Ok(settings)
    }

    /// Save to `path` atomically (write a sibling temp file, then rename).
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let payload = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, path)?;

        tracing::info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Platform settings path:
    /// macOS `~/Library/Application Support/GC2 Connect/settings.json`,
    /// Linux `~/.config/gc2-connect/settings.json`.
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        let base = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        let dir = if cfg!(target_os = "macos") {
            base.join("GC2 Connect")
        } else {
            base.join("gc2-connect")
        };
        Ok(dir.join("settings.json"))
    }
}

/// Forward-only migration to the current version. Version 1 documents gain
/// the `mode` field and the `open_range` section.
fn migrate(mut document: Value) -> Value {
    let Some(object) = document.as_object_mut() else {
        return document;
    };

    let version = object
        .get("version")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;

    if version < 2 {
        tracing::info!(from = version, to = SETTINGS_VERSION, "migrating settings");
        if !object.contains_key("mode") {
            object.insert("mode".into(), Value::String("remote".into()));
        }
        if !object.contains_key("open_range") {
            let defaults = serde_json::to_value(OpenRangeSettings::default())
                .expect("open range defaults serialize");
            object.insert("open_range".into(), defaults);
        }
        object.insert("version".into(), Value::from(SETTINGS_VERSION));
    }

    // Version-1 documents named the sections after the products.
    if !object.contains_key("remote") {
        if let Some(legacy) = object.remove("gspro") {
            object.insert("remote".into(), legacy);
        }
    }
    if !object.contains_key("device") {
        if let Some(legacy) = object.remove("gc2") {
            object.insert("device".into(), legacy);
        }
    }

    document
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_path(dir: &TempDir) -> PathBuf {
        dir.path().join("settings.json")
    }

    #[test]
    fn missing_file_yields_defaults_without_writing() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir);

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(!path.exists());
    }

    #[test]
    fn save_then_load_is_identity() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir);

        let mut settings = Settings::default();
        settings.mode = RouterMode::Local;
        settings.remote.host = "10.0.0.5".to_string();
        settings.remote.port = 922;
        settings.device.use_mock = true;
        settings.open_range.surface = Surface::Green;
        settings.open_range.conditions.wind_speed_mph = 12.0;
        settings.ui = serde_json::json!({"theme": "dark", "history_limit": 50});

        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/settings.json");

        Settings::default().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn v1_document_is_migrated() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir);
        fs::write(
            &path,
            serde_json::json!({
                "version": 1,
                "gspro": {"host": "192.168.1.50", "port": 921, "auto_connect": true},
                "gc2": {"auto_connect": false, "reject_zero_spin": false, "use_mock": false},
                "ui": {"theme": "dark"}
            })
            .to_string(),
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.mode, RouterMode::Remote);
        assert_eq!(settings.remote.host, "192.168.1.50");
        assert!(settings.remote.auto_connect);
        assert!(!settings.device.auto_connect);
        assert!(!settings.device.reject_zero_spin);
        assert_eq!(settings.open_range, OpenRangeSettings::default());

        // Migration happens in memory only.
        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["version"], 1);
    }

    #[test]
    fn migration_is_idempotent() {
        let v1 = serde_json::json!({"version": 1});
        let once = migrate(v1);
        let twice = migrate(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn malformed_file_is_a_recoverable_error() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir);
        fs::write(&path, "{not json").unwrap();

        let before = fs::read_to_string(&path).unwrap();
        let result = Settings::load(&path);
        assert!(matches!(result, Err(SettingsError::Malformed(_))));

        // The broken file is preserved for the user to inspect.
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn legacy_mode_string_loads() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir);
        fs::write(
            &path,
            serde_json::json!({"version": 2, "mode": "open_range"}).to_string(),
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.mode, RouterMode::Local);
    }

    #[test]
    fn conditions_without_pressure_get_the_standard_atmosphere() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir);
        fs::write(
            &path,
            serde_json::json!({
                "version": 2,
                "mode": "local",
                "open_range": {
                    "conditions": {
                        "temp_f": 85.0,
                        "elevation_ft": 1200.0,
                        "humidity_pct": 60.0,
                        "wind_speed_mph": 5.0,
                        "wind_dir_deg": 90.0
                    },
                    "surface": "Fairway",
                    "show_trajectory": true,
                    "camera_follow": true
                }
            })
            .to_string(),
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.open_range.conditions.temp_f, 85.0);
        assert_eq!(settings.open_range.conditions.pressure_inhg, 29.92);
    }

    #[test]
    fn temp_file_is_not_left_behind() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir);
        Settings::default().save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
    }
}
