use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `profiles` table, one per account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub timer_duration: u64,
    pub last_session_date: Option<String>,
    pub updated_at: DateTime<Utc>,
}
