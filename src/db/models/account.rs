use chrono::{DateTime, Utc};

/// Credential row for the offline account backend. Never serialised to the UI.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub provider: String,
    pub password_salt: Option<String>,
    pub password_digest: Option<String>,
    pub created_at: DateTime<Utc>,
}
