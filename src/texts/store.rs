use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    error::StorageError,
    models::{sort_newest_first, RecognizedTextRecord},
    storage::KeyValueStore,
};

pub const DEFAULT_STORAGE_KEY: &str = "recognizedTexts";

/// The saved list of recognized texts, kept as one JSON array under one key.
///
/// Mutations run under a single async lock so read-modify-write cycles never
/// interleave. Readers see either the previous or the new array, never a mix.
#[derive(Clone)]
pub struct RecognizedTextStore {
    kv: Arc<dyn KeyValueStore>,
    key: Arc<str>,
    write_lock: Arc<Mutex<()>>,
}

impl RecognizedTextStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(kv, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(kv: Arc<dyn KeyValueStore>, key: &str) -> Self {
        Self {
            kv,
            key: Arc::from(key),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn append(&self, text: &str) -> Result<Option<RecognizedTextRecord>, StorageError> {
        self.append_at(text, Utc::now()).await
    }

    /// Appends `text` recognized at `timestamp`. Blank text is skipped and yields `Ok(None)`.
    pub async fn append_at(
        &self,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<RecognizedTextRecord>, StorageError> {
        let Some(record) = RecognizedTextRecord::new(text, timestamp) else {
            return Ok(None);
        };

        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_entries().await?;
        entries.push(serde_json::to_value(&record)?);
        self.kv
            .set(&self.key, serde_json::to_string(&entries)?)
            .await?;

        info!(
            "Saved recognized text ({} chars), {} entries stored",
            record.text.chars().count(),
            entries.len()
        );
        Ok(Some(record))
    }

    /// Newest-first view of everything stored. Storage failures are logged and
    /// presented as an empty list.
    pub async fn list_all_sorted_newest_first(&self) -> Vec<RecognizedTextRecord> {
        match self.load_sorted().await {
            Ok(records) => records,
            Err(err) => {
                error!("Failed to load recognized texts: {err}");
                Vec::new()
            }
        }
    }

    pub async fn load_sorted(&self) -> Result<Vec<RecognizedTextRecord>, StorageError> {
        let mut records = self.load().await?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Removes the record at `index` of the newest-first list and stores the remaining
    /// records in that order. Out-of-range indices leave storage untouched.
    pub async fn delete_at(
        &self,
        index: usize,
    ) -> Result<Option<RecognizedTextRecord>, StorageError> {
        let _guard = self.write_lock.lock().await;
        let Decoded {
            mut records,
            unreadable,
        } = decode(self.load_entries().await?);
        sort_newest_first(&mut records);

        if index >= records.len() {
            warn!(
                "Ignoring delete at position {index}, only {} record(s) stored",
                records.len()
            );
            return Ok(None);
        }

        let removed = records.remove(index);
        self.save(&records, unreadable).await?;
        Ok(Some(removed))
    }

    pub async fn clear_all(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.kv.remove(&self.key).await?;
        info!("Cleared all recognized texts");
        Ok(())
    }

    pub async fn len(&self) -> Result<usize, StorageError> {
        Ok(self.load().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len().await? == 0)
    }

    /// Physical order. A missing key is an empty list. Blank and undecodable entries are left out.
    async fn load(&self) -> Result<Vec<RecognizedTextRecord>, StorageError> {
        Ok(decode(self.load_entries().await?).records)
    }

    /// Raw entries of the stored array. A payload that is not a JSON array is an error,
    /// so no mutation ever writes over it.
    async fn load_entries(&self) -> Result<Vec<Value>, StorageError> {
        let Some(raw) = self.kv.get(&self.key).await? else {
            return Ok(Vec::new());
        };

        serde_json::from_str(&raw).map_err(|err| StorageError::Corrupt {
            key: self.key.to_string(),
            reason: err.to_string(),
        })
    }

    /// Writes `records` in the given order, followed by the entries that could not be
    /// decoded, untouched.
    async fn save(
        &self,
        records: &[RecognizedTextRecord],
        unreadable: Vec<Value>,
    ) -> Result<(), StorageError> {
        let mut entries = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        entries.extend(unreadable);
        self.kv.set(&self.key, serde_json::to_string(&entries)?).await
    }
}

struct Decoded {
    records: Vec<RecognizedTextRecord>,
    unreadable: Vec<Value>,
}

fn decode(entries: Vec<Value>) -> Decoded {
    let mut decoded = Decoded {
        records: Vec::with_capacity(entries.len()),
        unreadable: Vec::new(),
    };
    let mut blank = 0;

    for entry in entries {
        match RecognizedTextRecord::deserialize(&entry) {
            Ok(record) if record.is_valid() => decoded.records.push(record),
            Ok(_) => blank += 1,
            Err(err) => {
                warn!("Skipping unreadable recognized text entry: {err}");
                decoded.unreadable.push(entry);
            }
        }
    }

    if blank > 0 {
        warn!("Dropped {blank} blank recognized text record(s)");
    }
    decoded
}
