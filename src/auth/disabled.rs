use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::db::{FeedbackRecord, Profile, ResponseRecord, SessionRecord};
use crate::questions::QuestionType;

use super::{AuthBoundary, AuthEvent, AuthUser, BoundaryError, BoundaryResult, ProfileUpdate};

/// Used when cloud sync is switched off: nobody is ever signed in and every
/// call reports that the service is unavailable.
pub struct DisabledBackend {
    events: broadcast::Sender<AuthEvent>,
}

impl Default for DisabledBackend {
    fn default() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

impl DisabledBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthBoundary for DisabledBackend {
    async fn init_auth(&self) -> BoundaryResult<Option<AuthUser>> {
        Err(BoundaryError::Unavailable)
    }

    async fn sign_up_with_email(&self, _email: &str, _password: &str) -> BoundaryResult<AuthUser> {
        Err(BoundaryError::Unavailable)
    }

    async fn sign_in_with_email(&self, _email: &str, _password: &str) -> BoundaryResult<AuthUser> {
        Err(BoundaryError::Unavailable)
    }

    async fn sign_in_with_oauth(&self, _provider: &str) -> BoundaryResult<String> {
        Err(BoundaryError::Unavailable)
    }

    async fn sign_in_with_magic_link(&self, _email: &str) -> BoundaryResult<()> {
        Err(BoundaryError::Unavailable)
    }

    async fn sign_out(&self) -> BoundaryResult<()> {
        Err(BoundaryError::Unavailable)
    }

    async fn reset_password(&self, _email: &str) -> BoundaryResult<()> {
        Err(BoundaryError::Unavailable)
    }

    async fn get_user_profile(&self) -> BoundaryResult<Profile> {
        Err(BoundaryError::Unavailable)
    }

    async fn update_user_profile(&self, _update: ProfileUpdate) -> BoundaryResult<Profile> {
        Err(BoundaryError::Unavailable)
    }

    async fn save_session(
        &self,
        _duration_seconds: u64,
        _journal_entry: Option<String>,
    ) -> BoundaryResult<SessionRecord> {
        Err(BoundaryError::Unavailable)
    }

    async fn save_response(
        &self,
        _question_type: QuestionType,
        _text: &str,
    ) -> BoundaryResult<ResponseRecord> {
        Err(BoundaryError::Unavailable)
    }

    async fn submit_feedback(&self, _message: &str) -> BoundaryResult<FeedbackRecord> {
        Err(BoundaryError::Unavailable)
    }

    fn current_user(&self) -> Option<AuthUser> {
        None
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
