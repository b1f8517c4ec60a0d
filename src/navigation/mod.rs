//! Page state machine. Exactly one of the three pages carries `active`; every
//! change goes through [`Navigator::show_page`], which serialises transitions
//! on a [`TransitionQueue`].

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::Timings;
use crate::dom::{Element, ElementCache, CLASS_ACTIVE};
use crate::menu::MenuScene;
use crate::timer::TimerController;
use crate::transition::{QueueTicket, TransitionCoordinator, TransitionQueue};
use crate::{log_debug, log_error};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Page {
    Landing,
    Timer,
    Menu,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Landing, Page::Timer, Page::Menu];

    pub fn as_str(self) -> &'static str {
        match self {
            Page::Landing => "landing",
            Page::Timer => "timer",
            Page::Menu => "menu",
        }
    }
}

pub struct Navigator {
    cache: Arc<ElementCache>,
    transitions: Arc<TransitionCoordinator>,
    queue: TransitionQueue,
    timer: TimerController,
    menu: Arc<MenuScene>,
    timings: Timings,
    debug_controls: bool,
}

impl Navigator {
    pub fn new(
        cache: Arc<ElementCache>,
        transitions: Arc<TransitionCoordinator>,
        timer: TimerController,
        menu: Arc<MenuScene>,
        timings: Timings,
        debug_controls: bool,
    ) -> Self {
        Self {
            cache,
            transitions,
            queue: TransitionQueue::new(),
            timer,
            menu,
            timings,
            debug_controls,
        }
    }

    /// The page currently marked active in the document.
    pub fn active_page(&self) -> Option<Page> {
        Page::ALL.into_iter().find(|page| {
            self.cache
                .has_class(Element::Page(*page), CLASS_ACTIVE)
                .unwrap_or(false)
        })
    }

    /// Queues a transition to `page`. Transitions run one at a time in the
    /// order they were requested.
    pub fn show_page(self: &Arc<Self>, page: Page) -> QueueTicket {
        let navigator = self.clone();
        self.queue.enqueue(async move {
            if let Err(err) = navigator.transition_to(page).await {
                log_error!("Navigation to {} aborted: {err:#}", page.as_str());
            }
        })
    }

    async fn transition_to(&self, page: Page) -> Result<()> {
        if let Some(current) = self.active_page().filter(|current| *current != page) {
            let leaving = Element::Page(current);
            self.cache.remove_class(leaving, CLASS_ACTIVE)?;
            self.transitions.next_frame().await;
            self.cache.set_hidden(leaving, true)?;
        }

        let target = Element::Page(page);
        let entrance = self.transitions.expect_animation(target, None);
        self.cache.set_hidden(target, false)?;
        self.cache.flush_layout(target)?;
        self.cache.add_class(target, CLASS_ACTIVE)?;
        self.cache.set_hidden(
            Element::DebugControls,
            !(self.debug_controls && page == Page::Timer),
        )?;

        let timeout = match page {
            Page::Menu => self
                .timings
                .page_animation_timeout()
                .min(self.timings.menu_entry_ceiling()),
            Page::Landing | Page::Timer => self.timings.page_animation_timeout(),
        };
        let outcome = entrance.wait(timeout).await;
        log_debug!("Entered {} page ({outcome:?})", page.as_str());

        self.enter(page).await
    }

    async fn enter(&self, page: Page) -> Result<()> {
        match page {
            Page::Landing => Ok(()),
            Page::Timer => {
                self.timer.reset();
                self.cache.set_hidden(Element::TimerIntro, false)?;
                self.cache.set_hidden(Element::TimerCircle, true)?;
                self.cache
                    .set_style(Element::ProgressRing, "stroke-dashoffset", Some("0"))
            }
            Page::Menu => {
                self.menu.enter().await;
                Ok(())
            }
        }
    }
}
