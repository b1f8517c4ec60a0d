use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use serde::Serialize;

use super::{Dom, Element, NodeId, Rect, Viewport};
use crate::navigation::Page;
use crate::pointer::{FloatingButton, BUTTON_SIZE};
use crate::questions::{Prompt, QuestionType, ADVICE_LINES};

/// One mutation, addressed by selector so the webview can replay it with
/// `querySelector`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DomPatch {
    AddClass { selector: String, class: String },
    RemoveClass { selector: String, class: String },
    SetHidden { selector: String, hidden: bool },
    SetStyle {
        selector: String,
        property: String,
        value: Option<String>,
    },
    SetText { selector: String, text: String },
    SetHtml { selector: String, html: String },
    SetValue { selector: String, value: String },
    FlushLayout { selector: String },
}

#[derive(Debug, Default, Clone)]
struct Node {
    selector: String,
    classes: BTreeSet<String>,
    hidden: bool,
    styles: BTreeMap<String, String>,
    text: String,
    html: String,
    value: String,
    /// Box measured by the page. Inline `left`/`top` in px override its origin.
    rect: Rect,
}

fn px(value: &str) -> Option<f64> {
    value.strip_suffix("px")?.trim().parse().ok()
}

impl Node {
    fn layout_rect(&self) -> Rect {
        let mut rect = self.rect;
        if let Some(x) = self.styles.get("left").and_then(|value| px(value)) {
            rect.x = x;
        }
        if let Some(y) = self.styles.get("top").and_then(|value| px(value)) {
            rect.y = y;
        }
        rect
    }
}

#[derive(Default)]
struct DomState {
    nodes: Vec<Node>,
    by_selector: HashMap<String, NodeId>,
    viewport: Viewport,
}

type PatchSink = Box<dyn Fn(DomPatch) + Send + Sync>;

/// In-memory document. It is the source of truth for reads; the optional
/// sink receives every write so a real page can mirror it.
pub struct VirtualDom {
    state: Mutex<DomState>,
    sink: Option<PatchSink>,
    reduced_motion: AtomicBool,
    queries: AtomicUsize,
}

impl Default for VirtualDom {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDom {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DomState::default()),
            sink: None,
            reduced_motion: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
        }
    }

    /// The document the application ships with: landing page active, every
    /// other page and overlay hidden.
    pub fn with_app_markup() -> Self {
        let dom = Self::new();
        dom.insert(&Element::Body.selector());

        for page in Page::ALL {
            let node = dom.insert(&Element::Page(page).selector());
            if page == Page::Landing {
                dom.lock().nodes[node.0 as usize]
                    .classes
                    .insert(super::CLASS_ACTIVE.into());
            } else {
                dom.lock().nodes[node.0 as usize].hidden = true;
            }
        }

        for element in [
            Element::DebugControls,
            Element::TimerCircle,
            Element::ModalOverlay,
            Element::QuestionsContainer,
        ] {
            dom.insert_hidden(element);
        }

        for element in [
            Element::TimerIntro,
            Element::TimerDisplay,
            Element::CircleDisplay,
            Element::ProgressRing,
            Element::MenuContent,
            Element::MenuTitle,
            Element::Triangle,
            Element::ModalBody,
            Element::ModalClose,
            Element::ModalStatus,
            Element::HomeButton,
        ] {
            dom.insert(&element.selector());
        }

        for button in FloatingButton::ALL {
            let node = dom.insert(&Element::FloatingButton(button).selector());
            dom.lock().nodes[node.0 as usize].rect = Rect {
                x: 0.0,
                y: 0.0,
                width: BUTTON_SIZE,
                height: BUTTON_SIZE,
            };
        }

        for (index, prompt) in Prompt::ALL.into_iter().enumerate() {
            let node = dom.insert(&Element::Prompt(prompt).selector());
            dom.lock().nodes[node.0 as usize].rect = Rect {
                x: 440.0,
                y: 220.0 + index as f64 * 90.0,
                width: 400.0,
                height: 60.0,
            };
            dom.insert_hidden(Element::PromptDetail(prompt));
        }

        for question in QuestionType::ALL {
            dom.insert(&Element::AnswerInput(question).selector());
        }

        for index in 0..ADVICE_LINES.len() {
            dom.insert(&Element::AdviceLine(index).selector());
        }

        dom
    }

    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(DomPatch) + Send + Sync + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    fn lock(&self) -> MutexGuard<'_, DomState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, patch: DomPatch) {
        if let Some(sink) = &self.sink {
            sink(patch);
        }
    }

    /// Adds an element (or returns the existing one) for `selector`.
    pub fn insert(&self, selector: &str) -> NodeId {
        let mut state = self.lock();
        if let Some(node) = state.by_selector.get(selector) {
            return *node;
        }
        let node = NodeId(state.nodes.len() as u32);
        state.nodes.push(Node {
            selector: selector.to_string(),
            ..Node::default()
        });
        state.by_selector.insert(selector.to_string(), node);
        node
    }

    fn insert_hidden(&self, element: Element) -> NodeId {
        let node = self.insert(&element.selector());
        self.lock().nodes[node.0 as usize].hidden = true;
        node
    }

    fn with_node<T>(&self, node: NodeId, read: impl FnOnce(&Node) -> T) -> Option<T> {
        self.lock().nodes.get(node.0 as usize).map(read)
    }

    fn update_node(&self, node: NodeId, write: impl FnOnce(&mut Node)) -> Option<String> {
        let mut state = self.lock();
        let entry = state.nodes.get_mut(node.0 as usize)?;
        write(entry);
        Some(entry.selector.clone())
    }

    fn find(&self, selector: &str) -> Option<NodeId> {
        self.lock().by_selector.get(selector).copied()
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.lock().viewport = viewport;
    }

    pub fn set_rect(&self, selector: &str, rect: Rect) -> bool {
        match self.find(selector) {
            Some(node) => self.update_node(node, |entry| entry.rect = rect).is_some(),
            None => false,
        }
    }

    pub fn set_reduced_motion(&self, reduced: bool) {
        self.reduced_motion.store(reduced, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    // Selector-based readers for assertions and the shell.

    pub fn element_has_class(&self, element: Element, class: &str) -> bool {
        self.find(&element.selector())
            .map(|node| self.has_class(node, class))
            .unwrap_or(false)
    }

    pub fn element_hidden(&self, element: Element) -> bool {
        self.find(&element.selector())
            .map(|node| self.is_hidden(node))
            .unwrap_or(true)
    }

    pub fn element_style(&self, element: Element, property: &str) -> Option<String> {
        self.find(&element.selector())
            .and_then(|node| self.style(node, property))
    }

    pub fn element_styles(&self, element: Element) -> BTreeMap<String, String> {
        self.find(&element.selector())
            .and_then(|node| self.with_node(node, |entry| entry.styles.clone()))
            .unwrap_or_default()
    }

    pub fn element_text(&self, element: Element) -> String {
        self.find(&element.selector())
            .and_then(|node| self.with_node(node, |entry| entry.text.clone()))
            .unwrap_or_default()
    }

    pub fn element_html(&self, element: Element) -> String {
        self.find(&element.selector())
            .and_then(|node| self.with_node(node, |entry| entry.html.clone()))
            .unwrap_or_default()
    }

    /// Selectors of every node currently carrying `class`.
    pub fn selectors_with_class(&self, class: &str) -> Vec<String> {
        self.lock()
            .nodes
            .iter()
            .filter(|node| node.classes.contains(class))
            .map(|node| node.selector.clone())
            .collect()
    }
}

impl Dom for VirtualDom {
    fn query(&self, selector: &str) -> Option<NodeId> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.find(selector)
    }

    fn add_class(&self, node: NodeId, class: &str) {
        if let Some(selector) = self.update_node(node, |entry| {
            entry.classes.insert(class.to_string());
        }) {
            self.emit(DomPatch::AddClass {
                selector,
                class: class.to_string(),
            });
        }
    }

    fn remove_class(&self, node: NodeId, class: &str) {
        if let Some(selector) = self.update_node(node, |entry| {
            entry.classes.remove(class);
        }) {
            self.emit(DomPatch::RemoveClass {
                selector,
                class: class.to_string(),
            });
        }
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.with_node(node, |entry| entry.classes.contains(class))
            .unwrap_or(false)
    }

    fn set_hidden(&self, node: NodeId, hidden: bool) {
        if let Some(selector) = self.update_node(node, |entry| entry.hidden = hidden) {
            self.emit(DomPatch::SetHidden { selector, hidden });
        }
    }

    fn is_hidden(&self, node: NodeId) -> bool {
        self.with_node(node, |entry| entry.hidden).unwrap_or(true)
    }

    fn set_style(&self, node: NodeId, property: &str, value: Option<&str>) {
        if let Some(selector) = self.update_node(node, |entry| match value {
            Some(value) => {
                entry.styles.insert(property.to_string(), value.to_string());
            }
            None => {
                entry.styles.remove(property);
            }
        }) {
            self.emit(DomPatch::SetStyle {
                selector,
                property: property.to_string(),
                value: value.map(str::to_string),
            });
        }
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.with_node(node, |entry| entry.styles.get(property).cloned())
            .flatten()
    }

    fn set_text(&self, node: NodeId, text: &str) {
        if let Some(selector) = self.update_node(node, |entry| entry.text = text.to_string()) {
            self.emit(DomPatch::SetText {
                selector,
                text: text.to_string(),
            });
        }
    }

    fn set_html(&self, node: NodeId, html: &str) {
        if let Some(selector) = self.update_node(node, |entry| entry.html = html.to_string()) {
            self.emit(DomPatch::SetHtml {
                selector,
                html: html.to_string(),
            });
        }
    }

    fn value(&self, node: NodeId) -> String {
        self.with_node(node, |entry| entry.value.clone())
            .unwrap_or_default()
    }

    fn set_value(&self, node: NodeId, value: &str) {
        if let Some(selector) = self.update_node(node, |entry| entry.value = value.to_string()) {
            self.emit(DomPatch::SetValue {
                selector,
                value: value.to_string(),
            });
        }
    }

    fn flush_layout(&self, node: NodeId) {
        if let Some(selector) = self.with_node(node, |entry| entry.selector.clone()) {
            self.emit(DomPatch::FlushLayout { selector });
        }
    }

    fn rect(&self, node: NodeId) -> Rect {
        self.with_node(node, Node::layout_rect).unwrap_or_default()
    }

    fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn app_markup_starts_on_the_landing_page() {
        let dom = VirtualDom::with_app_markup();
        assert_eq!(dom.selectors_with_class("active"), vec!["#landing-page"]);
        assert!(dom.element_hidden(Element::Page(Page::Timer)));
        assert!(dom.element_hidden(Element::Page(Page::Menu)));
        assert!(dom.element_hidden(Element::ModalOverlay));
    }

    #[test]
    fn positioned_elements_report_their_inline_origin() {
        let dom = VirtualDom::with_app_markup();
        let prompt = dom.insert(&Element::Prompt(Prompt::Advice).selector());
        let measured = dom.rect(prompt);

        dom.set_style(prompt, "top", Some("80px"));
        dom.set_style(prompt, "left", Some("auto"));
        assert_eq!(dom.rect(prompt), Rect { y: 80.0, ..measured });

        dom.set_style(prompt, "top", None);
        assert_eq!(dom.rect(prompt), measured);
    }

    #[test]
    fn sink_receives_every_mutation() {
        let patches = Arc::new(Mutex::new(Vec::new()));
        let recorded = patches.clone();
        let dom = VirtualDom::new().with_sink(move |patch| recorded.lock().unwrap().push(patch));
        let node = dom.insert("#menu-title");

        dom.add_class(node, "fade-in");
        dom.set_style(node, "opacity", Some("1"));
        dom.set_style(node, "opacity", None);

        assert_eq!(
            *patches.lock().unwrap(),
            vec![
                DomPatch::AddClass {
                    selector: "#menu-title".into(),
                    class: "fade-in".into()
                },
                DomPatch::SetStyle {
                    selector: "#menu-title".into(),
                    property: "opacity".into(),
                    value: Some("1".into())
                },
                DomPatch::SetStyle {
                    selector: "#menu-title".into(),
                    property: "opacity".into(),
                    value: None
                },
            ]
        );
    }
}
