//! In-memory elements for headless hosts and tests.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::element::{Element, EventHandler};
use crate::reactive::ListenerId;

/// A minimal element tree kept in memory.
///
/// Setters update state silently. [`MemoryElement::dispatch`] plays the part
/// of the user: it runs the listeners registered for an event.
pub struct MemoryElement {
    tag: String,
    attributes: RwLock<IndexMap<String, String>>,
    value: RwLock<String>,
    checked: AtomicBool,
    text: RwLock<String>,
    html: RwLock<String>,
    listeners: RwLock<Vec<(String, ListenerId, EventHandler)>>,
    children: RwLock<Vec<Arc<MemoryElement>>>,
}

impl MemoryElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: RwLock::new(IndexMap::new()),
            value: RwLock::new(String::new()),
            checked: AtomicBool::new(false),
            text: RwLock::new(String::new()),
            html: RwLock::new(String::new()),
            listeners: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
        }
    }

    /// An `<input>` of the given type.
    pub fn input(input_type: &str) -> Self {
        Self::new("input").with_attribute("type", input_type)
    }

    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.write().insert(name.into(), value.into());
        self
    }

    pub fn with_value(self, value: impl Into<String>) -> Self {
        *self.value.write() = value.into();
        self
    }

    /// Wrap in an `Arc`, ready to be bound.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.write().insert(name.into(), value.into());
    }

    pub fn append_child(&self, child: Arc<MemoryElement>) {
        self.children.write().push(child);
    }

    pub fn text_content(&self) -> String {
        self.text.read().clone()
    }

    pub fn inner_html(&self) -> String {
        self.html.read().clone()
    }

    /// Listeners currently attached, across all events.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Run every listener registered for `event`. Returns how many ran.
    pub fn dispatch(&self, event: &str) -> usize {
        let handlers: Vec<EventHandler> = self
            .listeners
            .read()
            .iter()
            .filter(|(name, _, _)| name == event)
            .map(|(_, _, handler)| handler.clone())
            .collect();
        for handler in &handlers {
            handler(self as &dyn Element);
        }
        handlers.len()
    }

    /// Set the value as a user would, then fire `event`.
    pub fn type_value(&self, value: &str, event: &str) -> usize {
        self.set_value(value);
        self.dispatch(event)
    }

    /// Set `checked` as a user would, then fire `input`.
    pub fn click(&self, checked: bool) -> usize {
        self.set_checked(checked);
        self.dispatch("input")
    }

    fn collect(&self, attribute: &str, found: &mut Vec<Arc<dyn Element>>) {
        for child in self.children.read().iter() {
            if child.attributes.read().contains_key(attribute) {
                found.push(child.clone());
            }
            child.collect(attribute, found);
        }
    }
}

impl Element for MemoryElement {
    fn tag_name(&self) -> String {
        self.tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.read().get(name).cloned()
    }

    fn value(&self) -> String {
        self.value.read().clone()
    }

    fn set_value(&self, value: &str) {
        *self.value.write() = value.to_owned();
    }

    fn checked(&self) -> bool {
        self.checked.load(Ordering::Acquire)
    }

    fn set_checked(&self, checked: bool) {
        self.checked.store(checked, Ordering::Release);
    }

    fn set_text_content(&self, text: &str) {
        *self.text.write() = text.to_owned();
    }

    fn set_inner_html(&self, html: &str) {
        *self.html.write() = html.to_owned();
    }

    fn add_event_listener(&self, event: &str, handler: EventHandler) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.write().push((event.to_owned(), id, handler));
        id
    }

    fn remove_event_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(name, listener_id, _)| !(name == event && *listener_id == id));
        listeners.len() != before
    }

    fn query_all(&self, attribute: &str) -> Vec<Arc<dyn Element>> {
        let mut found = Vec::new();
        self.collect(attribute, &mut found);
        found
    }
}

impl fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryElement")
            .field("tag", &self.tag)
            .field("attributes", &*self.attributes.read())
            .field("value", &*self.value.read())
            .field("checked", &self.checked())
            .field("listeners", &self.listener_count())
            .field("children", &self.children.read().len())
            .finish()
    }
}
