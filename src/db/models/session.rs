//! Rows written by the account layer when the user finishes a session,
//! answers a reflection prompt, or sends feedback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::questions::QuestionType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub journal_entry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseRecord {
    pub id: String,
    pub user_id: String,
    pub question_type: QuestionType,
    pub response_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
