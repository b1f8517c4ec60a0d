//! Fixtures shared by the component tests: a fully wired [`App`] over an
//! in-memory document and a backend that records what it was asked to do.

use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::broadcast;

use crate::app::{App, AppParts};
use crate::auth::sync::{AutoConfirm, Prompter};
use crate::auth::{
    AuthBoundary, AuthEvent, AuthEventKind, AuthUser, BoundaryError, BoundaryResult, Outcome,
    ProfileUpdate,
};
use crate::clock::FixedClock;
use crate::config::AppConfig;
use crate::db::{FeedbackRecord, Profile, ResponseRecord, SessionRecord};
use crate::dom::VirtualDom;
use crate::questions::QuestionType;
use crate::storage::MemoryStorage;

pub(crate) struct Harness {
    pub app: Arc<App>,
    pub dom: Arc<VirtualDom>,
    pub backend: Arc<RecordingBackend>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(AppConfig::default(), Arc::new(VirtualDom::with_app_markup()), Arc::new(AutoConfirm))
    }

    pub fn with_config(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::default();
        configure(&mut config);
        Self::build(config, Arc::new(VirtualDom::with_app_markup()), Arc::new(AutoConfirm))
    }

    pub fn with_dom(dom: Arc<VirtualDom>) -> Self {
        Self::build(AppConfig::default(), dom, Arc::new(AutoConfirm))
    }

    pub fn with_prompter(prompter: Arc<dyn Prompter>) -> Self {
        Self::build(
            AppConfig::default(),
            Arc::new(VirtualDom::with_app_markup()),
            prompter,
        )
    }

    fn build(config: AppConfig, dom: Arc<VirtualDom>, prompter: Arc<dyn Prompter>) -> Self {
        let backend = Arc::new(RecordingBackend::default());
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let app = App::new(AppParts {
            config,
            dom: dom.clone(),
            storage: Arc::new(MemoryStorage::new()),
            backend: backend.clone(),
            clock: Arc::new(FixedClock::on(day)),
            prompter,
        });
        Self { app, dom, backend }
    }
}

impl Deref for Harness {
    type Target = App;

    fn deref(&self) -> &App {
        &self.app
    }
}

/// In-memory account layer. Responses are recorded even without a
/// signed-in user so flows can be checked without signing in first.
pub(crate) struct RecordingBackend {
    user: Mutex<Option<AuthUser>>,
    failure: Mutex<Option<String>>,
    responses: Mutex<Vec<(QuestionType, String)>>,
    sessions: Mutex<Vec<u64>>,
    feedback: Mutex<Vec<String>>,
    profile_updates: Mutex<Vec<ProfileUpdate>>,
    save_delay: Mutex<Option<Duration>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            user: Mutex::new(None),
            failure: Mutex::new(None),
            responses: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            feedback: Mutex::new(Vec::new()),
            profile_updates: Mutex::new(Vec::new()),
            save_delay: Mutex::new(None),
            events,
        }
    }
}

impl RecordingBackend {
    /// Signs in without emitting an event.
    pub fn sign_in_as(&self, email: &str) {
        *self.user.lock().unwrap() = Some(user_for(email));
    }

    /// Makes every later call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Holds every later `save_response` for `delay` before recording it.
    pub fn delay_saves(&self, delay: Duration) {
        *self.save_delay.lock().unwrap() = Some(delay);
    }

    pub fn responses(&self) -> Vec<(QuestionType, String)> {
        self.responses.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> Vec<u64> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn feedback(&self) -> Vec<String> {
        self.feedback.lock().unwrap().clone()
    }

    pub fn profile_updates(&self) -> Vec<ProfileUpdate> {
        self.profile_updates.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), BoundaryError> {
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(BoundaryError::Rejected(message)),
            None => Ok(()),
        }
    }

    fn require_user(&self) -> Result<AuthUser, BoundaryError> {
        self.check()?;
        self.user
            .lock()
            .unwrap()
            .clone()
            .ok_or(BoundaryError::NotSignedIn)
    }

    fn switch_user(&self, kind: AuthEventKind, user: Option<AuthUser>) {
        *self.user.lock().unwrap() = user.clone();
        let _ = self.events.send(AuthEvent::new(kind, user));
    }

    fn profile(&self, user: &AuthUser) -> Profile {
        let updates = self.profile_updates.lock().unwrap();
        Profile {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: None,
            timer_duration: updates
                .iter()
                .rev()
                .find_map(|update| update.timer_duration)
                .unwrap_or(600),
            last_session_date: updates
                .iter()
                .rev()
                .find_map(|update| update.last_session_date.clone()),
            updated_at: Utc::now(),
        }
    }
}

fn user_for(email: &str) -> AuthUser {
    AuthUser {
        id: format!("user-{email}"),
        email: email.to_string(),
        provider: "email".into(),
    }
}

#[async_trait]
impl AuthBoundary for RecordingBackend {
    async fn init_auth(&self) -> BoundaryResult<Option<AuthUser>> {
        self.check()?;
        Ok(Outcome::new(self.current_user()))
    }

    async fn sign_up_with_email(&self, email: &str, _password: &str) -> BoundaryResult<AuthUser> {
        self.check()?;
        let user = user_for(email);
        self.switch_user(AuthEventKind::SignedUp, Some(user.clone()));
        Ok(Outcome::new(user))
    }

    async fn sign_in_with_email(&self, email: &str, _password: &str) -> BoundaryResult<AuthUser> {
        self.check()?;
        let user = user_for(email);
        self.switch_user(AuthEventKind::SignedIn, Some(user.clone()));
        Ok(Outcome::new(user))
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> BoundaryResult<String> {
        self.check()?;
        Ok(Outcome::new(format!("https://auth.test/{provider}")))
    }

    async fn sign_in_with_magic_link(&self, _email: &str) -> BoundaryResult<()> {
        self.check()?;
        Ok(Outcome::with_message((), "Link sent"))
    }

    async fn sign_out(&self) -> BoundaryResult<()> {
        self.check()?;
        self.switch_user(AuthEventKind::SignedOut, None);
        Ok(Outcome::new(()))
    }

    async fn reset_password(&self, _email: &str) -> BoundaryResult<()> {
        self.check()?;
        Ok(Outcome::new(()))
    }

    async fn get_user_profile(&self) -> BoundaryResult<Profile> {
        let user = self.require_user()?;
        Ok(Outcome::new(self.profile(&user)))
    }

    async fn update_user_profile(&self, update: ProfileUpdate) -> BoundaryResult<Profile> {
        let user = self.require_user()?;
        self.profile_updates.lock().unwrap().push(update);
        Ok(Outcome::new(self.profile(&user)))
    }

    async fn save_session(
        &self,
        duration_seconds: u64,
        journal_entry: Option<String>,
    ) -> BoundaryResult<SessionRecord> {
        let user = self.require_user()?;
        self.sessions.lock().unwrap().push(duration_seconds);
        Ok(Outcome::new(SessionRecord {
            id: format!("session-{duration_seconds}"),
            user_id: user.id,
            completed_at: Utc::now(),
            duration_seconds,
            journal_entry,
        }))
    }

    async fn save_response(
        &self,
        question_type: QuestionType,
        text: &str,
    ) -> BoundaryResult<ResponseRecord> {
        self.check()?;
        let delay = *self.save_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .push((question_type, text.to_string()));
        Ok(Outcome::new(ResponseRecord {
            id: "response".into(),
            user_id: self.current_user().map(|user| user.id).unwrap_or_default(),
            question_type,
            response_text: text.to_string(),
            created_at: Utc::now(),
        }))
    }

    async fn submit_feedback(&self, message: &str) -> BoundaryResult<FeedbackRecord> {
        self.check()?;
        self.feedback.lock().unwrap().push(message.to_string());
        Ok(Outcome::new(FeedbackRecord {
            id: "feedback".into(),
            user_id: self.current_user().map(|user| user.id),
            message: message.to_string(),
            created_at: Utc::now(),
        }))
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.user.lock().unwrap().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
