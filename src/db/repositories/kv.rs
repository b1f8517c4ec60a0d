use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::params;

use crate::db::connection::Database;

impl Database {
    pub async fn kv_entries(&self) -> Result<Vec<(String, String)>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM kv_store ORDER BY key")?;
            let entries = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
    }

    /// Fire-and-forget upsert; see `Database::submit`.
    pub fn queue_kv_set(&self, key: String, value: String) {
        self.submit("kv_set", move |conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to store key {key}"))?;
            Ok(())
        });
    }

    pub fn queue_kv_remove(&self, key: String) {
        self.submit("kv_remove", move |conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .with_context(|| format!("failed to remove key {key}"))?;
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_writes_apply_in_order() {
        let db = Database::in_memory().unwrap();
        db.queue_kv_set("timerDuration".into(), "600".into());
        db.queue_kv_set("timerDuration".into(), "1200".into());
        db.queue_kv_set("darkMode".into(), "true".into());
        db.queue_kv_remove("darkMode".into());

        let entries = db.kv_entries().await.unwrap();
        assert_eq!(entries, vec![("timerDuration".to_string(), "1200".to_string())]);
    }
}
