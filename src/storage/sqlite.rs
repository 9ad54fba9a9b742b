use async_trait::async_trait;

use super::KeyValueStore;
use crate::{db::Database, error::StorageError};

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get_value(key).await?)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        Ok(self.set_value(key, value).await?)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        Ok(self.remove_value(key).await?)
    }
}
