use anyhow::{Context, Result};
use rusqlite::params;

use crate::db::{connection::Database, models::FeedbackRecord};

impl Database {
    pub async fn insert_feedback(&self, feedback: &FeedbackRecord) -> Result<()> {
        let record = feedback.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO feedback (id, user_id, message, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id,
                    record.user_id,
                    record.message,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert feedback")?;
            Ok(())
        })
        .await
    }

    pub async fn count_feedback(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM feedback", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
