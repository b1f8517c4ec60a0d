use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_question_type},
    models::ResponseRecord,
};
use crate::questions::QuestionType;

fn row_to_response(row: &Row) -> Result<ResponseRecord> {
    let question_type: String = row.get("question_type")?;
    let created_at: String = row.get("created_at")?;

    Ok(ResponseRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        question_type: parse_question_type(&question_type)?,
        response_text: row.get("response_text")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn insert_response(&self, response: &ResponseRecord) -> Result<()> {
        let record = response.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO responses (id, user_id, question_type, response_text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.user_id,
                    record.question_type.as_str(),
                    record.response_text,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert response")?;
            Ok(())
        })
        .await
    }

    pub async fn list_responses(
        &self,
        user_id: &str,
        question_type: Option<QuestionType>,
    ) -> Result<Vec<ResponseRecord>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, question_type, response_text, created_at
                 FROM responses
                 WHERE user_id = ?1 AND (?2 IS NULL OR question_type = ?2)
                 ORDER BY created_at ASC",
            )?;
            let mut rows = stmt.query(params![user_id, question_type.map(|q| q.as_str())])?;
            let mut responses = Vec::new();
            while let Some(row) = rows.next()? {
                responses.push(row_to_response(row)?);
            }
            Ok(responses)
        })
        .await
    }
}
