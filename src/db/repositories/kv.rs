use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::Database;

impl Database {
    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read key {key}"))
        })
        .await
    }

    /// Inserts or replaces the whole value stored under `key`.
    pub async fn set_value(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write key {key}"))?;
            Ok(())
        })
        .await
    }

    pub async fn remove_value(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .with_context(|| format!("failed to delete key {key}"))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("kv.sqlite3")).unwrap();

        assert_eq!(db.get_value("recognizedTexts").await.unwrap(), None);

        db.set_value("recognizedTexts", "[]".into()).await.unwrap();
        db.set_value("recognizedTexts", "[1]".into()).await.unwrap();
        assert_eq!(
            db.get_value("recognizedTexts").await.unwrap().as_deref(),
            Some("[1]")
        );

        db.remove_value("recognizedTexts").await.unwrap();
        db.remove_value("recognizedTexts").await.unwrap();
        assert_eq!(db.get_value("recognizedTexts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kv.sqlite3");

        {
            let db = Database::new(path.clone()).unwrap();
            db.set_value("k", "v".into()).await.unwrap();
        }

        let db = Database::new(path).unwrap();
        assert_eq!(db.get_value("k").await.unwrap().as_deref(), Some("v"));
    }
}
