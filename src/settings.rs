use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{
    scan::{recognizer::IMAGE_PLACEHOLDER, ScanTimeouts},
    storage::StorageBackend,
    texts::DEFAULT_STORAGE_KEY,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            key: DEFAULT_STORAGE_KEY.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    /// Image file or drop directory. Defaults to `captures/` in the data directory.
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RecognizerSettings {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            program: "tesseract".into(),
            args: vec![IMAGE_PLACEHOLDER.into(), "stdout".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanSettings {
    pub capture_timeout_secs: u64,
    pub recognition_timeout_secs: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        let timeouts = ScanTimeouts::default();
        Self {
            capture_timeout_secs: timeouts.capture.as_secs(),
            recognition_timeout_secs: timeouts.recognition.as_secs(),
        }
    }
}

impl ScanSettings {
    pub fn timeouts(&self) -> ScanTimeouts {
        ScanTimeouts {
            capture: Duration::from_secs(self.capture_timeout_secs.max(1)),
            recognition: Duration::from_secs(self.recognition_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub storage: StorageSettings,
    pub capture: CaptureSettings,
    pub recognizer: RecognizerSettings,
    pub scan: ScanSettings,
}

pub struct SettingsStore {
    data: AppSettings,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring invalid settings in {}: {err}", path.display());
                AppSettings::default()
            })
        } else {
            AppSettings::default()
        };

        Ok(Self { data })
    }

    pub fn settings(&self) -> AppSettings {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        let settings = store.settings();
        assert_eq!(settings.storage.key, "recognizedTexts");
        assert_eq!(settings.storage.backend, StorageBackend::Sqlite);
        assert_eq!(settings.recognizer.program, "tesseract");
        assert_eq!(settings.scan.timeouts(), ScanTimeouts::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"storage":{"backend":"jsonFile"},"scan":{"recognitionTimeoutSecs":5}}"#,
        )
        .unwrap();

        let settings = SettingsStore::new(path).unwrap().settings();
        assert_eq!(settings.storage.backend, StorageBackend::JsonFile);
        assert_eq!(settings.storage.key, "recognizedTexts");
        assert_eq!(settings.scan.recognition_timeout_secs, 5);
        assert_eq!(settings.scan.capture_timeout_secs, 10);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        assert_eq!(SettingsStore::new(path).unwrap().settings(), AppSettings::default());
    }
}
