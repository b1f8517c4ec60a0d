//! Awaitable wrappers around CSS transition/animation completion.
//!
//! The platform publishes `transitionend`/`animationend` notifications through
//! [`TransitionCoordinator::notify`]. Waiters match on the element and, when
//! given, the property or animation name. Every wait is bounded by a timeout,
//! and reduced motion skips waiting entirely.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::dom::{Dom, Element};

/// One animation frame on the tokio clock.
pub const FRAME: Duration = Duration::from_millis(16);

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CompletionKind {
    Transition { property: String },
    Animation { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub selector: String,
    #[serde(flatten)]
    pub kind: CompletionKind,
}

impl CompletionEvent {
    pub fn transition(element: Element, property: &str) -> Self {
        Self {
            selector: element.selector(),
            kind: CompletionKind::Transition {
                property: property.to_string(),
            },
        }
    }

    pub fn animation(element: Element, name: &str) -> Self {
        Self {
            selector: element.selector(),
            kind: CompletionKind::Animation {
                name: name.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    TimedOut,
    /// Reduced motion: nothing was awaited.
    Skipped,
}

#[derive(Debug, Clone)]
enum Matcher {
    Transition(Option<String>),
    Animation(Option<String>),
}

impl Matcher {
    fn matches(&self, kind: &CompletionKind) -> bool {
        match (self, kind) {
            (Matcher::Transition(wanted), CompletionKind::Transition { property }) => {
                wanted.as_deref().map_or(true, |wanted| wanted == property)
            }
            (Matcher::Animation(wanted), CompletionKind::Animation { name }) => {
                wanted.as_deref().map_or(true, |wanted| wanted == name)
            }
            _ => false,
        }
    }
}

/// A completion wait registered before the mutation that triggers it, so an
/// event fired synchronously by the mutation is not missed.
pub struct PendingCompletion {
    receiver: Option<broadcast::Receiver<CompletionEvent>>,
    selector: String,
    matcher: Matcher,
}

impl PendingCompletion {
    pub async fn wait(self, timeout: Duration) -> WaitOutcome {
        let Some(mut receiver) = self.receiver else {
            return WaitOutcome::Skipped;
        };
        let selector = self.selector;
        let matcher = self.matcher;

        let completion = async {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.selector == selector && matcher.matches(&event.kind) => {
                        return;
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => std::future::pending::<()>().await,
                }
            }
        };

        match tokio::time::timeout(timeout, completion).await {
            Ok(()) => WaitOutcome::Completed,
            Err(_) => {
                debug!("No completion for {selector} within {timeout:?}; continuing");
                WaitOutcome::TimedOut
            }
        }
    }
}

pub struct TransitionCoordinator {
    events: broadcast::Sender<CompletionEvent>,
    dom: Arc<dyn Dom>,
    reduced_motion: AtomicBool,
}

impl TransitionCoordinator {
    pub fn new(dom: Arc<dyn Dom>, reduced_motion: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            events,
            dom,
            reduced_motion: AtomicBool::new(reduced_motion),
        }
    }

    pub fn set_reduced_motion(&self, reduced: bool) {
        self.reduced_motion.store(reduced, Ordering::SeqCst);
    }

    pub fn motion_reduced(&self) -> bool {
        self.reduced_motion.load(Ordering::SeqCst) || self.dom.prefers_reduced_motion()
    }

    /// Publishes a completion reported by the platform.
    pub fn notify(&self, event: CompletionEvent) {
        // No receivers simply means nobody is waiting.
        let _ = self.events.send(event);
    }

    fn expect(&self, element: Element, matcher: Matcher) -> PendingCompletion {
        let receiver = if self.motion_reduced() {
            None
        } else {
            Some(self.events.subscribe())
        };
        PendingCompletion {
            receiver,
            selector: element.selector(),
            matcher,
        }
    }

    /// Registers interest in a transition end; `property = None` matches any.
    pub fn expect_transition(&self, element: Element, property: Option<&str>) -> PendingCompletion {
        self.expect(element, Matcher::Transition(property.map(str::to_string)))
    }

    /// Registers interest in an animation end; `name = None` matches any.
    pub fn expect_animation(&self, element: Element, name: Option<&str>) -> PendingCompletion {
        self.expect(element, Matcher::Animation(name.map(str::to_string)))
    }

    pub async fn await_transition(
        &self,
        element: Element,
        property: Option<&str>,
        timeout: Duration,
    ) -> WaitOutcome {
        self.expect_transition(element, property).wait(timeout).await
    }

    pub async fn await_animation(
        &self,
        element: Element,
        name: Option<&str>,
        timeout: Duration,
    ) -> WaitOutcome {
        self.expect_animation(element, name).wait(timeout).await
    }

    /// Yields one animation frame.
    pub async fn next_frame(&self) {
        tokio::time::sleep(FRAME).await;
    }
}
