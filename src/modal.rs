//! The single modal dialog. Settings and feedback render into it; closing it
//! while on the menu page replays the menu entry so the scene comes back in.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::auth::{sync, AuthBoundary, AuthEvent, BoundaryError, Outcome};
use crate::dom::{Element, ElementCache, CLASS_FADE_OUT, CLASS_SHOW};
use crate::menu::MenuScene;
use crate::navigation::{Navigator, Page};
use crate::state::{SetOptions, StateKey, StateStore, StateValue};
use crate::views::{self, SettingsValues};
use crate::{log_debug, log_info, log_warn};

const ENABLE_LOGS: bool = true;

const CLASS_ERROR: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Settings,
    Feedback,
    Custom,
}

/// Controls inside the modal. Field values are read by the webview and sent
/// along with the action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SettingsAction {
    SetTimerMinutes { minutes: u64 },
    ToggleDarkMode,
    SetFontFamily { font: Option<String> },
    SignIn { email: String, password: String },
    SignUp { email: String, password: String },
    SignOut,
    MagicLink { email: String },
    ResetPassword { email: String },
    #[serde(rename = "oAuth")]
    OAuth { provider: String },
    SendFeedback { message: String },
}

pub struct ModalController {
    cache: Arc<ElementCache>,
    backend: Arc<dyn AuthBoundary>,
    store: Arc<StateStore>,
    navigator: Arc<Navigator>,
    menu: Arc<MenuScene>,
    providers: Vec<String>,
    open: Mutex<Option<ModalKind>>,
}

impl ModalController {
    pub fn new(
        cache: Arc<ElementCache>,
        backend: Arc<dyn AuthBoundary>,
        store: Arc<StateStore>,
        navigator: Arc<Navigator>,
        menu: Arc<MenuScene>,
        providers: Vec<String>,
    ) -> Self {
        Self {
            cache,
            backend,
            store,
            navigator,
            menu,
            providers,
            open: Mutex::new(None),
        }
    }

    fn lock_open(&self) -> MutexGuard<'_, Option<ModalKind>> {
        match self.open.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn current(&self) -> Option<ModalKind> {
        *self.lock_open()
    }

    /// Shows `content` in the modal, optionally without a close button.
    pub fn open(&self, content: &str, hide_close: bool) -> Result<()> {
        self.show(ModalKind::Custom, content, hide_close)
    }

    fn show(&self, kind: ModalKind, content: &str, hide_close: bool) -> Result<()> {
        self.cache.set_html(Element::ModalBody, content)?;
        self.cache.set_hidden(Element::ModalClose, hide_close)?;
        self.set_status("", false)?;
        self.cache.set_hidden(Element::ModalOverlay, false)?;
        self.cache.add_class(Element::ModalOverlay, CLASS_SHOW)?;
        *self.lock_open() = Some(kind);
        log_debug!("Modal opened ({kind:?})");
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        if self.lock_open().take().is_none() {
            return Ok(());
        }
        self.cache.remove_class(Element::ModalOverlay, CLASS_SHOW)?;
        self.cache.set_hidden(Element::ModalOverlay, true)?;
        self.cache.set_html(Element::ModalBody, "")?;
        self.cache.set_hidden(Element::ModalClose, false)?;

        if self.navigator.active_page() == Some(Page::Menu) {
            self.cache.remove_class(Element::MenuContent, CLASS_FADE_OUT)?;
            self.menu.enter().await;
        }
        Ok(())
    }

    fn settings_values(&self) -> SettingsValues {
        SettingsValues {
            timer_minutes: self.store.timer_duration() / 60,
            dark_mode: self.store.dark_mode(),
            font_family: self.store.font_family(),
        }
    }

    fn settings_markup(&self) -> String {
        let values = self.settings_values();
        match self.backend.current_user() {
            Some(user) => views::settings_signed_in(&values, &user),
            None => views::settings_anonymous(&values, &self.providers),
        }
    }

    pub fn open_settings(&self) -> Result<()> {
        self.show(ModalKind::Settings, &self.settings_markup(), false)
    }

    pub fn open_feedback(&self) -> Result<()> {
        self.show(ModalKind::Feedback, &views::feedback_form(), false)
    }

    pub fn set_status(&self, text: &str, is_error: bool) -> Result<()> {
        self.cache.set_text(Element::ModalStatus, text)?;
        if is_error {
            self.cache.add_class(Element::ModalStatus, CLASS_ERROR)
        } else {
            self.cache.remove_class(Element::ModalStatus, CLASS_ERROR)
        }
    }

    /// Re-renders the settings body in place. The status line is left alone so
    /// a sign-in message survives the refresh.
    fn refresh_settings(&self) -> Result<()> {
        if self.current() != Some(ModalKind::Settings) {
            return Ok(());
        }
        self.cache.set_html(Element::ModalBody, &self.settings_markup())
    }

    pub fn handle_auth_event(&self, event: &AuthEvent) {
        log_debug!("Auth event {:?} while modal is {:?}", event.event, self.current());
        if let Err(err) = self.refresh_settings() {
            log_warn!("Could not refresh settings: {err:#}");
        }
    }

    /// Keeps an open settings dialog in step with the signed-in user.
    pub fn watch_auth(self: &Arc<Self>) -> JoinHandle<()> {
        let modal = self.clone();
        let mut events = self.backend.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => modal.handle_auth_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        log_warn!("Modal missed {skipped} auth events");
                        if let Err(err) = modal.refresh_settings() {
                            log_warn!("Could not refresh settings: {err:#}");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Runs a control from the settings or feedback dialog and reports the
    /// result on the status line.
    pub async fn apply(&self, action: SettingsAction) -> Result<()> {
        let status = self.run_action(action).await;
        match status {
            Ok(Some(message)) => self.set_status(&message, false),
            Ok(None) => Ok(()),
            Err(err) => {
                log_info!("Settings action failed: {err}");
                self.set_status(&err.to_string(), true)
            }
        }
    }

    async fn run_action(&self, action: SettingsAction) -> Result<Option<String>, BoundaryError> {
        match action {
            SettingsAction::SetTimerMinutes { minutes } => {
                if !self.store.set_timer_duration(minutes.saturating_mul(60)) {
                    return Err(BoundaryError::Rejected(
                        "Timer must be at least 1 minute".into(),
                    ));
                }
                if let Some(Err(err)) = sync::push_profile(self.backend.as_ref(), &self.store).await
                {
                    log_warn!("Could not sync timer duration: {err}");
                }
                Ok(Some(format!("Timer set to {minutes} minutes")))
            }
            SettingsAction::ToggleDarkMode => {
                let enabled = !self.store.dark_mode();
                self.store.set(
                    StateKey::DarkMode,
                    StateValue::Flag(enabled),
                    SetOptions::default(),
                );
                Ok(None)
            }
            SettingsAction::SetFontFamily { font } => {
                let font = font.filter(|font| !font.trim().is_empty());
                self.store
                    .set(StateKey::FontFamily, StateValue::Text(font), SetOptions::default());
                Ok(None)
            }
            SettingsAction::SignIn { email, password } => self
                .backend
                .sign_in_with_email(&email, &password)
                .await
                .map(|outcome| message_or(outcome, "Signed in")),
            SettingsAction::SignUp { email, password } => self
                .backend
                .sign_up_with_email(&email, &password)
                .await
                .map(|outcome| message_or(outcome, "Account created")),
            SettingsAction::SignOut => self
                .backend
                .sign_out()
                .await
                .map(|outcome| message_or(outcome, "Signed out")),
            SettingsAction::MagicLink { email } => self
                .backend
                .sign_in_with_magic_link(&email)
                .await
                .map(|outcome| message_or(outcome, "Check your email for a login link")),
            SettingsAction::ResetPassword { email } => self
                .backend
                .reset_password(&email)
                .await
                .map(|outcome| message_or(outcome, "Check your email to reset your password")),
            SettingsAction::OAuth { provider } => self
                .backend
                .sign_in_with_oauth(&provider)
                .await
                .map(|outcome| {
                    log_debug!("{provider} sign-in started at {}", outcome.data);
                    message_or(outcome, &format!("Finish signing in with {provider}"))
                }),
            SettingsAction::SendFeedback { message } => {
                if message.trim().is_empty() {
                    return Err(BoundaryError::Rejected("Please write a message first".into()));
                }
                self.backend
                    .submit_feedback(message.trim())
                    .await
                    .map(|outcome| message_or(outcome, "Thanks for the feedback!"))
            }
        }
    }
}

fn message_or<T>(outcome: Outcome<T>, fallback: &str) -> Option<String> {
    Some(outcome.message.unwrap_or_else(|| fallback.to_string()))
}
