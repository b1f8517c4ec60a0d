use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u64},
    models::Profile,
};

fn row_to_profile(row: &Row) -> Result<Profile> {
    let timer_duration: i64 = row.get("timer_duration")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Profile {
        id: row.get("id")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        timer_duration: to_u64(timer_duration, "timer_duration")?,
        last_session_date: row.get("last_session_date")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, display_name, timer_duration, last_session_date, updated_at
                 FROM profiles
                 WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_profile(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Applies the provided columns; `None` leaves a column untouched.
    pub async fn update_profile(
        &self,
        user_id: &str,
        display_name: Option<String>,
        timer_duration: Option<u64>,
        last_session_date: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<Profile> {
        let user_id = user_id.to_string();
        let timer_duration = timer_duration.map(to_i64).transpose()?;
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE profiles
                 SET display_name = COALESCE(?1, display_name),
                     timer_duration = COALESCE(?2, timer_duration),
                     last_session_date = COALESCE(?3, last_session_date),
                     updated_at = ?4
                 WHERE id = ?5",
                params![
                    display_name,
                    timer_duration,
                    last_session_date,
                    updated_at.to_rfc3339(),
                    user_id,
                ],
            )?;
            if changed == 0 {
                return Err(anyhow!("profile {user_id} not found"));
            }

            let mut stmt = conn.prepare(
                "SELECT id, email, display_name, timer_duration, last_session_date, updated_at
                 FROM profiles
                 WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            match rows.next()? {
                Some(row) => row_to_profile(row),
                None => Err(anyhow!("profile {user_id} vanished after update")),
            }
        })
        .await
    }
}
