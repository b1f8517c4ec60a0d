//! Durable string key/value storage, the desktop stand-in for the browser's
//! local storage. Reads are synchronous; writes are mirrored to SQLite in the
//! background so UI handlers never wait on disk.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Result;

use crate::db::Database;

pub const KEY_TIMER_DURATION: &str = "timerDuration";
pub const KEY_DARK_MODE: &str = "darkMode";
pub const KEY_FONT_FAMILY: &str = "fontFamily";
pub const KEY_LAST_SESSION_DATE: &str = "lastSessionDate";
pub const KEY_HISTORY: &str = "betterLifeHistory";
pub const KEY_HISTORY_BACKUP: &str = "betterLifeHistoryUnreadable";
pub const KEY_HISTORY_MIGRATED: &str = "historyMigrated";

pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.lock().remove(key);
    }
}

/// Write-through cache over the `kv_store` table.
pub struct SqliteStorage {
    cache: MemoryStorage,
    db: Database,
}

impl SqliteStorage {
    pub async fn open(db: Database) -> Result<Arc<Self>> {
        let entries = db.kv_entries().await?;
        log::debug!("Loaded {} stored keys", entries.len());
        Ok(Arc::new(Self {
            cache: MemoryStorage::with_entries(entries),
            db,
        }))
    }
}

impl KeyValueStore for SqliteStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.cache.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) {
        self.cache.set_item(key, value);
        self.db.queue_kv_set(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.cache.remove_item(key);
        self.db.queue_kv_remove(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("betterlife.sqlite3");

        {
            let db = Database::new(path.clone()).unwrap();
            let storage = SqliteStorage::open(db.clone()).await.unwrap();
            storage.set_item(KEY_TIMER_DURATION, "1200");
            storage.set_item(KEY_DARK_MODE, "true");
            storage.remove_item(KEY_DARK_MODE);
            assert_eq!(storage.get_item(KEY_TIMER_DURATION).as_deref(), Some("1200"));
            // Round-trip through the worker so queued writes are flushed.
            db.kv_entries().await.unwrap();
        }

        let db = Database::new(path).unwrap();
        let storage = SqliteStorage::open(db).await.unwrap();
        assert_eq!(storage.get_item(KEY_TIMER_DURATION).as_deref(), Some("1200"));
        assert_eq!(storage.get_item(KEY_DARK_MODE), None);
    }
}
