//! The element seam.
//!
//! The binding engine never touches a real document. Hosts implement
//! [`Element`] over whatever they render into; [`MemoryElement`] is the
//! headless implementation.
//!
//! [`MemoryElement`]: super::MemoryElement

use std::sync::Arc;

use crate::reactive::ListenerId;

/// Called with the element the event fired on.
pub type EventHandler = Arc<dyn Fn(&dyn Element) + Send + Sync>;

/// A UI element the engine can read from, write into and listen on.
///
/// Setters must not dispatch events themselves; only user input does.
pub trait Element: Send + Sync {
    /// Tag name, in any case (`"input"`, `"SELECT"`).
    fn tag_name(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;

    /// Current value of a form control. Empty for other elements.
    fn value(&self) -> String;
    fn set_value(&self, value: &str);

    fn checked(&self) -> bool;
    fn set_checked(&self, checked: bool);

    fn set_text_content(&self, text: &str);
    fn set_inner_html(&self, html: &str);

    fn add_event_listener(&self, event: &str, handler: EventHandler) -> ListenerId;

    /// Returns `false` if no such listener was registered.
    fn remove_event_listener(&self, event: &str, id: ListenerId) -> bool;

    /// Every descendant (not the element itself) carrying `attribute`, in
    /// document order.
    fn query_all(&self, attribute: &str) -> Vec<Arc<dyn Element>>;
}

/// How an element displays and edits a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// `<input type="checkbox">`, bound through `checked`.
    Checkbox,
    /// `<input type="radio">`, checked when its value matches the model.
    Radio,
    /// `<input type="number">` or `"range"`, written back as a number.
    Number,
    /// Any other `<input>`.
    Text,
    TextArea,
    Select,
    /// Everything else, bound through text content or inner HTML.
    Content,
}

impl ElementKind {
    pub fn of(element: &dyn Element) -> Self {
        let tag = element.tag_name().to_ascii_lowercase();
        match tag.as_str() {
            "input" => {
                let input_type = element
                    .attribute("type")
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                match input_type.as_str() {
                    "checkbox" => ElementKind::Checkbox,
                    "radio" => ElementKind::Radio,
                    "number" | "range" => ElementKind::Number,
                    _ => ElementKind::Text,
                }
            }
            "textarea" => ElementKind::TextArea,
            "select" => ElementKind::Select,
            _ => ElementKind::Content,
        }
    }

    /// Event that carries user edits, or `None` for content elements.
    pub fn input_event(self) -> Option<&'static str> {
        match self {
            ElementKind::Select => Some("change"),
            ElementKind::Content => None,
            _ => Some("input"),
        }
    }

    pub fn is_form_control(self) -> bool {
        self != ElementKind::Content
    }
}
