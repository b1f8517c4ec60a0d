use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{anyhow, Result};

use super::{Dom, Element, NodeId, Rect, Viewport};

/// Resolves [`Element`]s to nodes once and remembers the answer. Misses are
/// not cached, so an element rendered later (modal content) is picked up on
/// the next lookup.
pub struct ElementCache {
    dom: Arc<dyn Dom>,
    resolved: Mutex<HashMap<Element, NodeId>>,
}

impl ElementCache {
    pub fn new(dom: Arc<dyn Dom>) -> Self {
        Self {
            dom,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Element, NodeId>> {
        match self.resolved.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn node(&self, element: Element) -> Result<NodeId> {
        if let Some(node) = self.lock().get(&element) {
            return Ok(*node);
        }
        let selector = element.selector();
        let node = self
            .dom
            .query(&selector)
            .ok_or_else(|| anyhow!("missing element {selector}"))?;
        self.lock().insert(element, node);
        Ok(node)
    }

    pub fn add_class(&self, element: Element, class: &str) -> Result<()> {
        let node = self.node(element)?;
        self.dom.add_class(node, class);
        Ok(())
    }

    pub fn remove_class(&self, element: Element, class: &str) -> Result<()> {
        let node = self.node(element)?;
        self.dom.remove_class(node, class);
        Ok(())
    }

    pub fn has_class(&self, element: Element, class: &str) -> Result<bool> {
        let node = self.node(element)?;
        Ok(self.dom.has_class(node, class))
    }

    pub fn set_hidden(&self, element: Element, hidden: bool) -> Result<()> {
        let node = self.node(element)?;
        self.dom.set_hidden(node, hidden);
        Ok(())
    }

    pub fn is_hidden(&self, element: Element) -> Result<bool> {
        let node = self.node(element)?;
        Ok(self.dom.is_hidden(node))
    }

    pub fn set_style(&self, element: Element, property: &str, value: Option<&str>) -> Result<()> {
        let node = self.node(element)?;
        self.dom.set_style(node, property, value);
        Ok(())
    }

    pub fn set_text(&self, element: Element, text: &str) -> Result<()> {
        let node = self.node(element)?;
        self.dom.set_text(node, text);
        Ok(())
    }

    pub fn set_html(&self, element: Element, html: &str) -> Result<()> {
        let node = self.node(element)?;
        self.dom.set_html(node, html);
        Ok(())
    }

    pub fn value(&self, element: Element) -> Result<String> {
        let node = self.node(element)?;
        Ok(self.dom.value(node))
    }

    pub fn set_value(&self, element: Element, value: &str) -> Result<()> {
        let node = self.node(element)?;
        self.dom.set_value(node, value);
        Ok(())
    }

    pub fn flush_layout(&self, element: Element) -> Result<()> {
        let node = self.node(element)?;
        self.dom.flush_layout(node);
        Ok(())
    }

    pub fn rect(&self, element: Element) -> Result<Rect> {
        let node = self.node(element)?;
        Ok(self.dom.rect(node))
    }

    pub fn viewport(&self) -> Viewport {
        self.dom.viewport()
    }
}
