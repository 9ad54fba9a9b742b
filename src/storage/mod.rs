//! Durable string key-value backends.
//!
//! The recognized-text list lives under a single key, so every backend only has to
//! offer whole-value reads and replacements. A `set` either fully replaces the stored
//! value or fails and leaves the previous one in place.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

mod file;
mod memory;
mod sqlite;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    JsonFile,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::JsonFile => "jsonFile",
            StorageBackend::Memory => "memory",
        }
    }
}
