use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use log::warn;

use super::KeyValueStore;
use crate::error::StorageError;

/// All keys kept in one pretty-printed JSON object on disk.
///
/// Writes go to a sibling temp file which is then renamed over the original, and the
/// cached map only advances after the rename succeeded.
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(err) => {
                    let aside = quarantine_path(&path);
                    fs::rename(&path, &aside).map_err(|source| StorageError::Io {
                        path: aside.clone(),
                        source,
                    })?;
                    warn!(
                        "Unreadable key-value file {} moved to {}: {err}",
                        path.display(),
                        aside.display()
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn update<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| StorageError::Unavailable("key-value file lock poisoned".into()))?;

        let mut next = guard.clone();
        mutate(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let serialized = serde_json::to_string_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");

        fs::write(&tmp_path, serialized).map_err(|source| StorageError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// `storage.json` → `storage.json.corrupt`
fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .data
            .lock()
            .map_err(|_| StorageError::Unavailable("key-value file lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.update(|data| {
            data.insert(key.to_string(), value);
        })
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|data| {
            data.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileStore::open(path.clone()).unwrap();
        store.set("recognizedTexts", "[]".into()).await.unwrap();
        store.set("other", "x".into()).await.unwrap();
        store.remove("other").await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(path).unwrap();
        assert_eq!(
            reopened.get("recognizedTexts").await.unwrap().as_deref(),
            Some("[]")
        );
        assert_eq!(reopened.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreadable_file_is_moved_aside_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::open(path.clone()).unwrap();
        assert_eq!(store.get("recognizedTexts").await.unwrap(), None);

        store.set("recognizedTexts", "[]".into()).await.unwrap();

        let aside = dir.path().join("storage.json.corrupt");
        assert_eq!(fs::read_to_string(aside).unwrap(), "{not json");
        assert!(fs::read_to_string(path).unwrap().contains("recognizedTexts"));
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(path).unwrap();
        store.set("k", "old".into()).await.unwrap();

        // The temp file cannot be created once its directory is gone.
        drop(dir);

        assert!(store.set("k", "new".into()).await.is_err());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("old"));
    }
}
