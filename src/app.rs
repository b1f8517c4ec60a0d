//! Composition root. [`App`] owns one instance of every component, wires the
//! cross-component reactions (timer finished, signed up, signed in) and turns
//! [`UiEvent`]s from the page into calls on the right component.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::auth::sync::{self, Prompter};
use crate::auth::{AuthBoundary, AuthEvent, AuthEventKind, BoundaryError};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::dom::{Dom, Element, ElementCache, CLASS_DARK_MODE};
use crate::history::HistoryLog;
use crate::menu::MenuScene;
use crate::modal::{ModalController, SettingsAction};
use crate::navigation::{Navigator, Page};
use crate::pointer::{DragController, FloatingButton, FloatingLayout, TriangleMarker};
use crate::questions::{Prompt, QuestionType, QuestionsFlow};
use crate::state::{StateKey, StateStore};
use crate::storage::KeyValueStore;
use crate::timer::{TimerController, TimerEvent};
use crate::transition::{CompletionEvent, TransitionCoordinator};
use crate::{log_debug, log_error, log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// Everything the page can ask the core to do.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiEvent {
    /// Landing page call to action.
    Begin,
    StartTimer,
    PauseTimer,
    ResetTimer,
    SubtractMinutes { minutes: u64 },
    ShowPage { page: Page },
    ButtonPointerDown { button: FloatingButton, x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    ButtonClick { button: FloatingButton },
    MenuClick { x: f64, y: f64 },
    SelectPrompt { prompt: Prompt },
    /// Sent on blur or Enter with the textarea's value. Without `text` the
    /// answer input's last known value is used.
    SubmitAnswer {
        question: QuestionType,
        #[serde(default)]
        text: Option<String>,
    },
    QuestionsBackgroundClick {
        #[serde(default)]
        interactive: bool,
    },
    QuestionsHome,
    CloseModal,
    Settings(SettingsAction),
    Resize,
}

/// Platform pieces the core is assembled from.
pub struct AppParts {
    pub config: AppConfig,
    pub dom: Arc<dyn Dom>,
    pub storage: Arc<dyn KeyValueStore>,
    pub backend: Arc<dyn AuthBoundary>,
    pub clock: Arc<dyn Clock>,
    pub prompter: Arc<dyn Prompter>,
}

pub struct App {
    pub config: AppConfig,
    pub cache: Arc<ElementCache>,
    pub transitions: Arc<TransitionCoordinator>,
    pub storage: Arc<dyn KeyValueStore>,
    pub store: Arc<StateStore>,
    pub history: Arc<HistoryLog>,
    pub backend: Arc<dyn AuthBoundary>,
    pub clock: Arc<dyn Clock>,
    pub timer: TimerController,
    pub triangle: Arc<TriangleMarker>,
    pub menu: Arc<MenuScene>,
    pub navigator: Arc<Navigator>,
    pub questions: Arc<QuestionsFlow>,
    pub modal: Arc<ModalController>,
    pub drag: DragController,
    prompter: Arc<dyn Prompter>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl App {
    pub fn new(parts: AppParts) -> Arc<Self> {
        let AppParts {
            config,
            dom,
            storage,
            backend,
            clock,
            prompter,
        } = parts;

        let reduced_motion = config.reduced_motion || dom.prefers_reduced_motion();
        let cache = Arc::new(ElementCache::new(dom.clone()));
        let transitions = Arc::new(TransitionCoordinator::new(dom, reduced_motion));
        let store = Arc::new(StateStore::load(storage.clone()));
        let history = Arc::new(HistoryLog::new(storage.clone()));

        let timer = TimerController::new(store.clone(), cache.clone(), clock.clone());
        let triangle = Arc::new(TriangleMarker::new(cache.clone(), config.triangle_speed));
        let menu = Arc::new(MenuScene::new(
            cache.clone(),
            transitions.clone(),
            store.clone(),
            triangle.clone(),
            config.timings.clone(),
        ));
        let navigator = Arc::new(Navigator::new(
            cache.clone(),
            transitions.clone(),
            timer.clone(),
            menu.clone(),
            config.timings.clone(),
            config.debug,
        ));
        let questions = Arc::new(QuestionsFlow::new(
            cache.clone(),
            transitions.clone(),
            backend.clone(),
            history.clone(),
            clock.clone(),
            config.timings.clone(),
        ));
        let modal = Arc::new(ModalController::new(
            cache.clone(),
            backend.clone(),
            store.clone(),
            navigator.clone(),
            menu.clone(),
            config.oauth_providers.clone(),
        ));
        let drag = DragController::new(cache.clone());

        Arc::new(Self {
            config,
            cache,
            transitions,
            storage,
            store,
            history,
            backend,
            clock,
            timer,
            triangle,
            menu,
            navigator,
            questions,
            modal,
            drag,
            prompter,
            tasks: Mutex::new(Vec::new()),
        })
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Applies persisted preferences, starts the background listeners and
    /// restores any saved session.
    pub async fn start(self: &Arc<Self>) {
        self.watch_preferences();
        self.apply_theme();

        let listeners = vec![
            self.spawn_timer_listener(),
            self.spawn_auth_listener(),
            self.modal.watch_auth(),
        ];
        self.lock_tasks().extend(listeners);

        match self.backend.init_auth().await {
            Ok(outcome) => {
                if let Some(user) = outcome.data {
                    log_info!("Restored session for {}", user.email);
                    self.pull_profile().await;
                }
            }
            Err(BoundaryError::Unavailable) => log_debug!("Running without cloud sync"),
            Err(err) => log_warn!("Could not restore session: {err}"),
        }
    }

    /// Stops the background listeners.
    pub fn shutdown(&self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }

    fn apply_theme(&self) {
        let dark = self.store.dark_mode();
        let font = self.store.font_family();
        if let Err(err) = apply_dark_mode(&self.cache, dark)
            .and_then(|_| apply_font_family(&self.cache, font.as_deref()))
        {
            log_warn!("Could not apply theme: {err:#}");
        }
    }

    fn watch_preferences(&self) {
        let cache = self.cache.clone();
        self.store.subscribe(StateKey::DarkMode, move |value, _| {
            if let Err(err) = apply_dark_mode(&cache, value.as_flag().unwrap_or(false)) {
                log_warn!("Could not toggle dark mode: {err:#}");
            }
        });

        let cache = self.cache.clone();
        self.store.subscribe(StateKey::FontFamily, move |value, _| {
            if let Err(err) = apply_font_family(&cache, value.as_text()) {
                log_warn!("Could not change font: {err:#}");
            }
        });
    }

    fn spawn_timer_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let app = self.clone();
        let mut events = self.timer.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(TimerEvent::Finished { duration_seconds }) => {
                        app.on_timer_finished(duration_seconds).await;
                    }
                    Ok(TimerEvent::Tick(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        log_warn!("Timer listener skipped {skipped} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn on_timer_finished(&self, duration_seconds: u64) {
        log_info!("Session of {duration_seconds}s complete");
        self.navigator.show_page(Page::Menu);

        if self.backend.current_user().is_none() {
            return;
        }
        if let Err(err) = self.backend.save_session(duration_seconds, None).await {
            log_warn!("Could not save session: {err}");
        }
        if let Some(Err(err)) = sync::push_profile(self.backend.as_ref(), &self.store).await {
            log_warn!("Could not sync profile: {err}");
        }
    }

    fn spawn_auth_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let app = self.clone();
        let mut events = self.backend.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => app.on_auth_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        log_warn!("Auth listener skipped {skipped} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn on_auth_event(&self, event: AuthEvent) {
        log_debug!("Auth event {:?}", event.event);
        match event.event {
            AuthEventKind::SignedUp => {
                let report = sync::migrate_local_history(
                    self.backend.as_ref(),
                    &self.history,
                    self.storage.as_ref(),
                    self.prompter.as_ref(),
                )
                .await;
                log_info!("History migration: {report:?}");
            }
            AuthEventKind::SignedIn => self.pull_profile().await,
            AuthEventKind::InitialSession
            | AuthEventKind::SignedOut
            | AuthEventKind::UserUpdated => {}
        }
    }

    async fn pull_profile(&self) {
        match sync::pull_profile(self.backend.as_ref(), &self.store).await {
            Ok(profile) => log_debug!("Pulled profile, timer {}s", profile.timer_duration),
            Err(err) => log_warn!("Could not load profile: {err}"),
        }
    }

    /// Routes one page event. Long choreographies are spawned so the caller
    /// is never held for the length of an animation.
    pub async fn handle(self: &Arc<Self>, event: UiEvent) -> Result<()> {
        log_debug!("UI event {event:?}");
        match event {
            UiEvent::Begin => {
                self.navigator.show_page(Page::Timer);
            }
            UiEvent::StartTimer => {
                self.timer.start()?;
            }
            UiEvent::PauseTimer => {
                self.timer.pause();
            }
            UiEvent::ResetTimer => self.timer.reset(),
            UiEvent::SubtractMinutes { minutes } => self.timer.subtract_minutes(minutes),
            UiEvent::ShowPage { page } => {
                if page != Page::Menu {
                    self.questions.reset();
                }
                self.navigator.show_page(page);
            }
            UiEvent::ButtonPointerDown { button, x, y } => {
                self.drag.pointer_down(button, x, y)?;
            }
            UiEvent::PointerMove { x, y } => self.drag.pointer_move(x, y)?,
            UiEvent::PointerUp => self.drag.pointer_up(),
            UiEvent::ButtonClick { button } => {
                if self.drag.click(button) {
                    self.open_button(button)?;
                }
            }
            UiEvent::MenuClick { x, y } => {
                if self.navigator.active_page() == Some(Page::Menu)
                    && !self.questions.is_open()
                    && self.triangle.is_visible()
                {
                    self.triangle.glide_to(x, y);
                }
            }
            UiEvent::SelectPrompt { prompt } => {
                let questions = self.questions.clone();
                tokio::spawn(async move { questions.select(prompt).await });
            }
            UiEvent::SubmitAnswer { question, text } => {
                let text = match text {
                    Some(text) => text,
                    None => self.cache.value(Element::AnswerInput(question))?,
                };
                let questions = self.questions.clone();
                tokio::spawn(async move {
                    questions.submit(question, &text).await;
                });
            }
            UiEvent::QuestionsBackgroundClick { interactive } => {
                self.questions.background_click(interactive)
            }
            UiEvent::QuestionsHome => self.questions.home(),
            UiEvent::CloseModal => {
                let modal = self.modal.clone();
                tokio::spawn(async move {
                    if let Err(err) = modal.close().await {
                        log_error!("Closing modal failed: {err:#}");
                    }
                });
            }
            UiEvent::Settings(action) => self.modal.apply(action).await?,
            UiEvent::Resize => {
                if self.navigator.active_page() == Some(Page::Menu) {
                    FloatingLayout::apply(&self.cache)?;
                }
            }
        }
        Ok(())
    }

    fn open_button(&self, button: FloatingButton) -> Result<()> {
        match button {
            FloatingButton::Questions => {
                let questions = self.questions.clone();
                tokio::spawn(async move { questions.open().await });
                Ok(())
            }
            FloatingButton::Settings => self.modal.open_settings(),
            FloatingButton::Feedback => self.modal.open_feedback(),
        }
    }

    /// Forwards a `transitionend`/`animationend` reported by the page.
    pub fn complete(&self, event: CompletionEvent) {
        self.transitions.notify(event);
    }

    pub fn set_reduced_motion(&self, reduced: bool) {
        self.transitions.set_reduced_motion(reduced);
    }
}

fn apply_dark_mode(cache: &ElementCache, enabled: bool) -> Result<()> {
    if enabled {
        cache.add_class(Element::Body, CLASS_DARK_MODE)
    } else {
        cache.remove_class(Element::Body, CLASS_DARK_MODE)
    }
}

fn apply_font_family(cache: &ElementCache, font: Option<&str>) -> Result<()> {
    cache.set_style(Element::Body, "font-family", font)
}
