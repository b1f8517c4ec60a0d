use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u64},
    models::SessionRecord,
};

fn row_to_session(row: &Row) -> Result<SessionRecord> {
    let completed_at: String = row.get("completed_at")?;
    let duration_seconds: i64 = row.get("duration_seconds")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        completed_at: parse_datetime(&completed_at, "completed_at")?,
        duration_seconds: to_u64(duration_seconds, "duration_seconds")?,
        journal_entry: row.get("journal_entry")?,
    })
}

impl Database {
    pub async fn insert_session_record(&self, session: &SessionRecord) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, completed_at, duration_seconds, journal_entry)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.user_id,
                    record.completed_at.to_rfc3339(),
                    to_i64(record.duration_seconds)?,
                    record.journal_entry,
                ],
            )
            .with_context(|| "failed to insert session")?;
            Ok(())
        })
        .await
    }

    pub async fn list_session_records(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, completed_at, duration_seconds, journal_entry
                 FROM sessions
                 WHERE user_id = ?1
                 ORDER BY completed_at DESC",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }
}
