//! Account layer. Everything the UI needs from a backend goes through
//! [`AuthBoundary`]; the rest of the crate never knows which implementation
//! it is talking to.

mod disabled;
mod offline;
pub mod sync;

pub use disabled::DisabledBackend;
pub use offline::OfflineBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::{FeedbackRecord, Profile, ResponseRecord, SessionRecord};
use crate::questions::QuestionType;

/// A successful boundary call: its payload plus an optional message meant
/// for the user ("check your inbox").
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub data: T,
    pub message: Option<String>,
}

impl<T> Outcome<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoundaryError {
    #[error("Cloud sync is not available")]
    Unavailable,
    #[error("You need to sign in first")]
    NotSignedIn,
    #[error("{0}")]
    Rejected(String),
    #[error("Something went wrong: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for BoundaryError {
    fn from(err: anyhow::Error) -> Self {
        BoundaryError::Internal(format!("{err:#}"))
    }
}

pub type BoundaryResult<T> = Result<Outcome<T>, BoundaryError>;

/// Wire shape of a boundary result: `{success: true, data, message?}` or
/// `{success: false, error}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Reply<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<BoundaryResult<T>> for Reply<T> {
    fn from(result: BoundaryResult<T>) -> Self {
        match result {
            Ok(outcome) => Reply {
                success: true,
                data: Some(outcome.data),
                message: outcome.message,
                error: None,
            },
            Err(err) => Reply {
                success: false,
                data: None,
                message: None,
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub provider: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedUp,
    SignedIn,
    SignedOut,
    UserUpdated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthEvent {
    pub event: AuthEventKind,
    pub user: Option<AuthUser>,
    pub authenticated: bool,
}

impl AuthEvent {
    pub fn new(event: AuthEventKind, user: Option<AuthUser>) -> Self {
        Self {
            event,
            authenticated: user.is_some(),
            user,
        }
    }
}

/// Columns to change on the signed-in user's profile; `None` keeps the
/// stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub timer_duration: Option<u64>,
    pub last_session_date: Option<String>,
}

#[async_trait]
pub trait AuthBoundary: Send + Sync {
    /// Restores a persisted session, if any.
    async fn init_auth(&self) -> BoundaryResult<Option<AuthUser>>;
    async fn sign_up_with_email(&self, email: &str, password: &str) -> BoundaryResult<AuthUser>;
    async fn sign_in_with_email(&self, email: &str, password: &str) -> BoundaryResult<AuthUser>;
    /// Returns the URL the provider's consent page should open.
    async fn sign_in_with_oauth(&self, provider: &str) -> BoundaryResult<String>;
    async fn sign_in_with_magic_link(&self, email: &str) -> BoundaryResult<()>;
    async fn sign_out(&self) -> BoundaryResult<()>;
    async fn reset_password(&self, email: &str) -> BoundaryResult<()>;
    async fn get_user_profile(&self) -> BoundaryResult<Profile>;
    async fn update_user_profile(&self, update: ProfileUpdate) -> BoundaryResult<Profile>;
    async fn save_session(
        &self,
        duration_seconds: u64,
        journal_entry: Option<String>,
    ) -> BoundaryResult<SessionRecord>;
    async fn save_response(
        &self,
        question_type: QuestionType,
        text: &str,
    ) -> BoundaryResult<ResponseRecord>;
    async fn submit_feedback(&self, message: &str) -> BoundaryResult<FeedbackRecord>;

    fn current_user(&self) -> Option<AuthUser>;
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
