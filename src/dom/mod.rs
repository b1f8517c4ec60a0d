//! DOM abstraction. Components never touch markup directly: they name
//! elements through [`Element`], resolve them through the [`ElementCache`],
//! and mutate them through the [`Dom`] trait. The desktop shell backs the
//! trait with a [`VirtualDom`] that forwards every mutation to the webview.

mod cache;
mod virtual_dom;

pub use cache::ElementCache;
pub use virtual_dom::{DomPatch, VirtualDom};

use serde::{Deserialize, Serialize};

use crate::navigation::Page;
use crate::pointer::FloatingButton;
use crate::questions::{Prompt, QuestionType};

pub const CLASS_ACTIVE: &str = "active";
pub const CLASS_SHOW: &str = "show";
pub const CLASS_VISIBLE: &str = "visible";
pub const CLASS_FADE_IN: &str = "fade-in";
pub const CLASS_FADE_OUT: &str = "fade-out";
pub const CLASS_KEEP_VISIBLE: &str = "keep-visible";
pub const CLASS_AT_TOP: &str = "at-top";
pub const CLASS_DARK_MODE: &str = "dark-mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl Viewport {
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// Every element the UI core touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    Body,
    Page(Page),
    DebugControls,
    TimerIntro,
    TimerCircle,
    TimerDisplay,
    CircleDisplay,
    ProgressRing,
    MenuContent,
    MenuTitle,
    Triangle,
    FloatingButton(FloatingButton),
    ModalOverlay,
    ModalBody,
    ModalClose,
    ModalStatus,
    QuestionsContainer,
    Prompt(Prompt),
    PromptDetail(Prompt),
    AnswerInput(QuestionType),
    AdviceLine(usize),
    HomeButton,
}

impl Element {
    pub fn selector(&self) -> String {
        match self {
            Element::Body => "body".into(),
            Element::Page(page) => format!("#{}-page", page.as_str()),
            Element::DebugControls => "#debug-controls".into(),
            Element::TimerIntro => "#timer-intro".into(),
            Element::TimerCircle => "#timer-circle".into(),
            Element::TimerDisplay => "#timer-display".into(),
            Element::CircleDisplay => "#circle-display".into(),
            Element::ProgressRing => "#progress-ring-circle".into(),
            Element::MenuContent => "#menu-content".into(),
            Element::MenuTitle => "#menu-title".into(),
            Element::Triangle => "#triangle".into(),
            Element::FloatingButton(button) => format!("#{}-button", button.as_str()),
            Element::ModalOverlay => "#modal-overlay".into(),
            Element::ModalBody => "#modal-body".into(),
            Element::ModalClose => "#modal-close".into(),
            Element::ModalStatus => "#modal-status".into(),
            Element::QuestionsContainer => "#questions-container".into(),
            Element::Prompt(prompt) => format!("#prompt-{}", prompt.as_str()),
            Element::PromptDetail(prompt) => format!("#detail-{}", prompt.as_str()),
            Element::AnswerInput(question) => format!("#input-{}", question.as_str()),
            Element::AdviceLine(index) => format!("#advice-line-{index}"),
            Element::HomeButton => "#home-button".into(),
        }
    }
}

/// Mutation and measurement surface of the page. Implementations must be
/// cheap to call; nothing here blocks on rendering.
pub trait Dom: Send + Sync {
    fn query(&self, selector: &str) -> Option<NodeId>;

    fn add_class(&self, node: NodeId, class: &str);
    fn remove_class(&self, node: NodeId, class: &str);
    fn has_class(&self, node: NodeId, class: &str) -> bool;

    fn set_hidden(&self, node: NodeId, hidden: bool);
    fn is_hidden(&self, node: NodeId) -> bool;

    /// `None` clears the inline property.
    fn set_style(&self, node: NodeId, property: &str, value: Option<&str>);
    fn style(&self, node: NodeId, property: &str) -> Option<String>;

    fn set_text(&self, node: NodeId, text: &str);
    fn set_html(&self, node: NodeId, html: &str);
    fn value(&self, node: NodeId) -> String;
    fn set_value(&self, node: NodeId, value: &str);

    /// Forces a synchronous layout so the next class change animates from
    /// the current computed state.
    fn flush_layout(&self, node: NodeId);

    fn rect(&self, node: NodeId) -> Rect;
    fn viewport(&self) -> Viewport;
    fn prefers_reduced_motion(&self) -> bool;
}
