use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::{Account, Database, FeedbackRecord, Profile, ResponseRecord, SessionRecord};
use crate::questions::QuestionType;
use crate::state::store::{DEFAULT_TIMER_DURATION_SECS, MIN_TIMER_DURATION_SECS};

use super::{
    AuthBoundary, AuthEvent, AuthEventKind, AuthUser, BoundaryError, BoundaryResult, Outcome,
    ProfileUpdate,
};

const EMAIL_PROVIDER: &str = "email";
const MIN_PASSWORD_LEN: usize = 6;
const EVENT_CAPACITY: usize = 16;

fn normalise_email(email: &str) -> Result<String, BoundaryError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(BoundaryError::Rejected("Please enter a valid email address".into()));
    }
    Ok(email)
}

fn new_salt() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn to_user(account: &Account) -> AuthUser {
    AuthUser {
        id: account.id.clone(),
        email: account.email.clone(),
        provider: account.provider.clone(),
    }
}

/// Account backend that lives entirely in the local SQLite database. Reads
/// and writes of profiles, sessions and responses are limited to the
/// signed-in owner; feedback may be sent anonymously.
pub struct OfflineBackend {
    db: Database,
    providers: Vec<String>,
    session: RwLock<Option<AuthUser>>,
    events: broadcast::Sender<AuthEvent>,
}

impl OfflineBackend {
    pub fn new(db: Database, providers: Vec<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            providers,
            session: RwLock::new(None),
            events,
        }
    }

    fn require_user(&self) -> Result<AuthUser, BoundaryError> {
        self.current_user().ok_or(BoundaryError::NotSignedIn)
    }

    fn set_session(&self, user: Option<AuthUser>, kind: AuthEventKind) {
        {
            let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
            *session = user.clone();
        }
        let _ = self.events.send(AuthEvent::new(kind, user));
    }
}

#[async_trait]
impl AuthBoundary for OfflineBackend {
    async fn init_auth(&self) -> BoundaryResult<Option<AuthUser>> {
        let user = match self.db.signed_in_account_id().await? {
            Some(id) => self.db.find_account(&id).await?.map(|account| to_user(&account)),
            None => None,
        };
        self.set_session(user.clone(), AuthEventKind::InitialSession);
        Ok(Outcome::new(user))
    }

    async fn sign_up_with_email(&self, email: &str, password: &str) -> BoundaryResult<AuthUser> {
        let email = normalise_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BoundaryError::Rejected(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.db.find_account_by_email(&email).await?.is_some() {
            return Err(BoundaryError::Rejected("User already registered".into()));
        }

        let salt = new_salt();
        let account = Account {
            id: Uuid::new_v4().to_string(),
            email,
            provider: EMAIL_PROVIDER.into(),
            password_digest: Some(password_digest(&salt, password)),
            password_salt: Some(salt),
            created_at: Utc::now(),
        };
        self.db
            .insert_account(&account, DEFAULT_TIMER_DURATION_SECS)
            .await?;
        self.db.set_signed_in_account(Some(account.id.clone())).await?;

        let user = to_user(&account);
        info!("Created account {}", user.id);
        self.set_session(Some(user.clone()), AuthEventKind::SignedUp);
        Ok(Outcome::with_message(user, "Account created"))
    }

    async fn sign_in_with_email(&self, email: &str, password: &str) -> BoundaryResult<AuthUser> {
        let invalid = || BoundaryError::Rejected("Invalid login credentials".into());
        let email = normalise_email(email)?;
        let account = self
            .db
            .find_account_by_email(&email)
            .await?
            .ok_or_else(invalid)?;

        let matches = match (&account.password_salt, &account.password_digest) {
            (Some(salt), Some(digest)) => password_digest(salt, password) == *digest,
            _ => false,
        };
        if !matches {
            warn!("Rejected sign-in for {}", account.id);
            return Err(invalid());
        }

        self.db.set_signed_in_account(Some(account.id.clone())).await?;
        let user = to_user(&account);
        self.set_session(Some(user.clone()), AuthEventKind::SignedIn);
        Ok(Outcome::new(user))
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> BoundaryResult<String> {
        let Some(known) = self
            .providers
            .iter()
            .find(|known| known.eq_ignore_ascii_case(provider))
        else {
            return Err(BoundaryError::Rejected(format!(
                "Unsupported sign-in provider: {provider}"
            )));
        };
        warn!("Refused {known} sign-in: no identity provider offline");
        Err(BoundaryError::Rejected(format!(
            "Signing in with {known} isn't available offline. Use email and password."
        )))
    }

    async fn sign_in_with_magic_link(&self, email: &str) -> BoundaryResult<()> {
        normalise_email(email)?;
        Err(BoundaryError::Rejected(
            "Login links need email delivery, which isn't available offline".into(),
        ))
    }

    async fn sign_out(&self) -> BoundaryResult<()> {
        self.db.set_signed_in_account(None).await?;
        self.set_session(None, AuthEventKind::SignedOut);
        Ok(Outcome::new(()))
    }

    async fn reset_password(&self, email: &str) -> BoundaryResult<()> {
        normalise_email(email)?;
        Err(BoundaryError::Rejected(
            "Password reset needs email delivery, which isn't available offline".into(),
        ))
    }

    async fn get_user_profile(&self) -> BoundaryResult<Profile> {
        let user = self.require_user()?;
        self.db
            .get_profile(&user.id)
            .await?
            .map(Outcome::new)
            .ok_or_else(|| BoundaryError::Rejected("Profile not found".into()))
    }

    async fn update_user_profile(&self, update: ProfileUpdate) -> BoundaryResult<Profile> {
        let user = self.require_user()?;
        if matches!(update.timer_duration, Some(secs) if secs < MIN_TIMER_DURATION_SECS) {
            return Err(BoundaryError::Rejected(format!(
                "Timer duration must be at least {MIN_TIMER_DURATION_SECS} seconds"
            )));
        }
        let profile = self
            .db
            .update_profile(
                &user.id,
                update.display_name,
                update.timer_duration,
                update.last_session_date,
                Utc::now(),
            )
            .await?;
        let _ = self
            .events
            .send(AuthEvent::new(AuthEventKind::UserUpdated, Some(user)));
        Ok(Outcome::new(profile))
    }

    async fn save_session(
        &self,
        duration_seconds: u64,
        journal_entry: Option<String>,
    ) -> BoundaryResult<SessionRecord> {
        let user = self.require_user()?;
        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            completed_at: Utc::now(),
            duration_seconds,
            journal_entry: journal_entry.filter(|entry| !entry.trim().is_empty()),
        };
        self.db.insert_session_record(&record).await?;
        Ok(Outcome::new(record))
    }

    async fn save_response(
        &self,
        question_type: QuestionType,
        text: &str,
    ) -> BoundaryResult<ResponseRecord> {
        let user = self.require_user()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(BoundaryError::Rejected("Response cannot be empty".into()));
        }
        let record = ResponseRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            question_type,
            response_text: text.to_string(),
            created_at: Utc::now(),
        };
        self.db.insert_response(&record).await?;
        Ok(Outcome::new(record))
    }

    async fn submit_feedback(&self, message: &str) -> BoundaryResult<FeedbackRecord> {
        let message = message.trim();
        if message.is_empty() {
            return Err(BoundaryError::Rejected("Feedback cannot be empty".into()));
        }
        let record = FeedbackRecord {
            id: Uuid::new_v4().to_string(),
            user_id: self.current_user().map(|user| user.id),
            message: message.to_string(),
            created_at: Utc::now(),
        };
        self.db.insert_feedback(&record).await?;
        Ok(Outcome::with_message(record, "Thanks for your feedback!"))
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> OfflineBackend {
        OfflineBackend::new(
            Database::in_memory().unwrap(),
            vec!["google".into(), "github".into()],
        )
    }

    #[tokio::test]
    async fn sign_up_then_sign_in_again() {
        let backend = backend();
        let mut events = backend.subscribe();

        let user = backend
            .sign_up_with_email(" Ada@Example.com ", "hunter22")
            .await
            .unwrap()
            .data;
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(events.recv().await.unwrap().event, AuthEventKind::SignedUp);

        let profile = backend.get_user_profile().await.unwrap().data;
        assert_eq!(profile.timer_duration, DEFAULT_TIMER_DURATION_SECS);

        backend.sign_out().await.unwrap();
        assert!(backend.current_user().is_none());
        assert!(matches!(
            backend.get_user_profile().await,
            Err(BoundaryError::NotSignedIn)
        ));

        assert!(backend
            .sign_in_with_email("ada@example.com", "wrong-password")
            .await
            .is_err());
        let again = backend
            .sign_in_with_email("ADA@example.com", "hunter22")
            .await
            .unwrap()
            .data;
        assert_eq!(again.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_and_malformed_sign_ups_are_rejected() {
        let backend = backend();
        backend
            .sign_up_with_email("ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(
            backend
                .sign_up_with_email("ada@example.com", "hunter22")
                .await
                .unwrap_err(),
            BoundaryError::Rejected("User already registered".into())
        );
        assert!(backend.sign_up_with_email("not-an-email", "hunter22").await.is_err());
        assert!(backend.sign_up_with_email("bob@example.com", "123").await.is_err());
    }

    #[tokio::test]
    async fn owner_only_writes_and_open_feedback() {
        let backend = backend();
        assert!(matches!(
            backend.save_response(QuestionType::BetterToday, "walk").await,
            Err(BoundaryError::NotSignedIn)
        ));
        let anonymous = backend.submit_feedback("love it").await.unwrap().data;
        assert_eq!(anonymous.user_id, None);

        let user = backend
            .sign_up_with_email("ada@example.com", "hunter22")
            .await
            .unwrap()
            .data;
        backend
            .save_response(QuestionType::LifeMeaning, "  family ")
            .await
            .unwrap();
        backend.save_session(1_200, None).await.unwrap();

        let stored = backend
            .db
            .list_responses(&user.id, Some(QuestionType::LifeMeaning))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].response_text, "family");
        assert_eq!(backend.db.list_session_records(&user.id).await.unwrap().len(), 1);
        assert_eq!(backend.db.count_feedback().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn profile_updates_validate_duration() {
        let backend = backend();
        backend
            .sign_up_with_email("ada@example.com", "hunter22")
            .await
            .unwrap();

        assert!(backend
            .update_user_profile(ProfileUpdate {
                timer_duration: Some(30),
                ..ProfileUpdate::default()
            })
            .await
            .is_err());

        let profile = backend
            .update_user_profile(ProfileUpdate {
                timer_duration: Some(1_800),
                last_session_date: Some("Mon Jan 01 2024".into()),
                ..ProfileUpdate::default()
            })
            .await
            .unwrap()
            .data;
        assert_eq!(profile.timer_duration, 1_800);
        assert_eq!(profile.last_session_date.as_deref(), Some("Mon Jan 01 2024"));
    }

    #[tokio::test]
    async fn email_links_and_oauth_are_refused_offline() {
        fn refused<T: std::fmt::Debug>(result: BoundaryResult<T>) -> String {
            match result {
                Err(BoundaryError::Rejected(message)) => message,
                other => panic!("expected a refusal, got {other:?}"),
            }
        }

        let backend = backend();

        assert!(refused(backend.sign_in_with_oauth("GitHub").await).contains("GitHub"));
        assert!(refused(backend.sign_in_with_oauth("myspace").await).starts_with("Unsupported"));
        assert!(refused(backend.sign_in_with_magic_link("ada@example.com").await)
            .contains("isn't available offline"));
        assert!(refused(backend.reset_password("ada@example.com").await)
            .contains("isn't available offline"));
        assert!(refused(backend.reset_password("not-an-email").await).contains("valid email"));
    }

    #[tokio::test]
    async fn session_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("betterlife.sqlite3");
        let user = {
            let backend = OfflineBackend::new(Database::new(path.clone()).unwrap(), vec![]);
            backend
                .sign_up_with_email("ada@example.com", "hunter22")
                .await
                .unwrap()
                .data
        };

        let backend = OfflineBackend::new(Database::new(path).unwrap(), vec![]);
        let restored = backend.init_auth().await.unwrap().data;
        assert_eq!(restored, Some(user));
        assert!(backend.current_user().is_some());
    }
}
