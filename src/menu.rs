//! What happens every time the menu page is entered: the floating buttons fade
//! in, the welcome title plays once per session, then the triangle marker
//! takes over.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::config::Timings;
use crate::dom::{
    Element, ElementCache, CLASS_FADE_IN, CLASS_FADE_OUT, CLASS_VISIBLE,
};
use crate::pointer::{FloatingButton, FloatingLayout, TriangleMarker};
use crate::state::{SetOptions, StateKey, StateStore, StateValue};
use crate::transition::TransitionCoordinator;
use crate::{log_debug, log_error, log_info};

const ENABLE_LOGS: bool = true;

pub struct MenuScene {
    cache: Arc<ElementCache>,
    transitions: Arc<TransitionCoordinator>,
    store: Arc<StateStore>,
    triangle: Arc<TriangleMarker>,
    timings: Timings,
    title_task: Mutex<Option<JoinHandle<()>>>,
}

impl MenuScene {
    pub fn new(
        cache: Arc<ElementCache>,
        transitions: Arc<TransitionCoordinator>,
        store: Arc<StateStore>,
        triangle: Arc<TriangleMarker>,
        timings: Timings,
    ) -> Self {
        Self {
            cache,
            transitions,
            store,
            triangle,
            timings,
            title_task: Mutex::new(None),
        }
    }

    fn lock_title_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.title_task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Runs the entry choreography. Never fails: on error the menu is forced
    /// into its fully visible end state.
    pub async fn enter(self: &Arc<Self>) {
        if let Err(err) = self.run_enter().await {
            log_error!("Menu entry failed, forcing visible state: {err:#}");
            self.force_visible();
        }
    }

    async fn run_enter(self: &Arc<Self>) -> Result<()> {
        FloatingLayout::apply(&self.cache)?;
        for button in FloatingButton::ALL {
            self.cache
                .remove_class(Element::FloatingButton(button), CLASS_VISIBLE)?;
        }

        tokio::time::sleep(self.timings.button_fade_delay()).await;
        for button in FloatingButton::ALL {
            self.cache
                .add_class(Element::FloatingButton(button), CLASS_VISIBLE)?;
        }

        if self.store.menu_title_dismissed() {
            self.cache.add_class(Element::MenuTitle, CLASS_FADE_OUT)?;
            return self.triangle.show();
        }

        self.cache.remove_class(Element::MenuTitle, CLASS_FADE_OUT)?;
        self.cache.add_class(Element::MenuTitle, CLASS_FADE_IN)?;
        self.schedule_title_dismiss();
        Ok(())
    }

    fn schedule_title_dismiss(self: &Arc<Self>) {
        let mut task = self.lock_title_task();
        if let Some(previous) = task.take() {
            log_debug!("Cancelling pending title dismissal");
            previous.abort();
        }

        let scene = self.clone();
        let delay = self.timings.title_dismiss_delay();
        *task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = scene.dismiss_title().await {
                log_error!("Title dismissal failed: {err:#}");
                scene.force_visible();
            }
        }));
    }

    async fn dismiss_title(&self) -> Result<()> {
        let fade = self
            .transitions
            .expect_transition(Element::MenuTitle, Some("opacity"));
        self.cache.remove_class(Element::MenuTitle, CLASS_FADE_IN)?;
        self.cache.add_class(Element::MenuTitle, CLASS_FADE_OUT)?;
        fade.wait(self.timings.fade_timeout()).await;

        self.store.set(
            StateKey::MenuTitleDismissed,
            StateValue::Flag(true),
            SetOptions::default(),
        );
        log_info!("Menu title dismissed");
        self.triangle.show()
    }

    /// Whether a title dismissal is still scheduled.
    pub fn title_pending(&self) -> bool {
        self.lock_title_task()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Fallback end state: content, buttons and title all shown.
    pub fn force_visible(&self) {
        let mut steps: Vec<Result<()>> = vec![
            self.cache.remove_class(Element::MenuContent, CLASS_FADE_OUT),
            self.cache.set_style(Element::MenuContent, "opacity", Some("1")),
            self.cache.remove_class(Element::MenuTitle, CLASS_FADE_OUT),
            self.cache.set_style(Element::MenuTitle, "opacity", Some("1")),
        ];
        for button in FloatingButton::ALL {
            steps.push(
                self.cache
                    .add_class(Element::FloatingButton(button), CLASS_VISIBLE),
            );
        }
        for err in steps.into_iter().filter_map(Result::err) {
            log_error!("Could not force menu element visible: {err:#}");
        }
    }
}
