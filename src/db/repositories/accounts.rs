use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{connection::Database, helpers::parse_datetime, models::Account};

fn row_to_account(row: &Row) -> Result<Account> {
    let created_at: String = row.get("created_at")?;

    Ok(Account {
        id: row.get("id")?,
        email: row.get("email")?,
        provider: row.get("provider")?,
        password_salt: row.get("password_salt")?,
        password_digest: row.get("password_digest")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Inserts the account and its empty profile in one transaction.
    pub async fn insert_account(&self, account: &Account, timer_duration: u64) -> Result<()> {
        let record = account.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO accounts (id, email, provider, password_salt, password_digest, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.email,
                    record.provider,
                    record.password_salt,
                    record.password_digest,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert account")?;
            tx.execute(
                "INSERT INTO profiles (id, email, display_name, timer_duration, last_session_date, updated_at)
                 VALUES (?1, ?2, NULL, ?3, NULL, ?4)",
                params![
                    record.id,
                    record.email,
                    crate::db::helpers::to_i64(timer_duration)?,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert profile")?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let email = email.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, provider, password_salt, password_digest, created_at
                 FROM accounts
                 WHERE email = ?1",
            )?;
            let mut rows = stmt.query(params![email])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_account(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn find_account(&self, id: &str) -> Result<Option<Account>> {
        let id = id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, provider, password_salt, password_digest, created_at
                 FROM accounts
                 WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_account(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn set_signed_in_account(&self, user_id: Option<String>) -> Result<()> {
        self.execute(move |conn| {
            match user_id {
                Some(user_id) => {
                    conn.execute(
                        "INSERT INTO auth_state (id, user_id, signed_in_at) VALUES (1, ?1, ?2)
                         ON CONFLICT(id) DO UPDATE SET user_id = excluded.user_id,
                                                       signed_in_at = excluded.signed_in_at",
                        params![user_id, Utc::now().to_rfc3339()],
                    )
                    .with_context(|| "failed to record signed-in account")?;
                }
                None => {
                    conn.execute("DELETE FROM auth_state", [])
                        .with_context(|| "failed to clear signed-in account")?;
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn signed_in_account_id(&self) -> Result<Option<String>> {
        self.execute(|conn| {
            let user_id = conn
                .query_row("SELECT user_id FROM auth_state WHERE id = 1", [], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            Ok(user_id)
        })
        .await
    }
}
