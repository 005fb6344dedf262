//! Binding Engine
//!
//! Keeps an [`Element`] in sync with one dot-path of a [`Reactive`] model.
//!
//! # How Bindings Work
//!
//! 1. On [`bind`], the current value at the path is pushed into the element.
//!
//! 2. A path watcher pushes every later change of that exact key.
//!
//! 3. Unless the binding is one-way, a listener on the element's input event
//!    (`change` for selects, `input` otherwise) writes the element's value
//!    back through the model, so the write notifies like any other.
//!
//! How a value is shown depends on the [`ElementKind`]:
//!
//! | kind            | model to view                          | view to model       |
//! |-----------------|----------------------------------------|---------------------|
//! | checkbox        | `checked = truthy(value)`              | bool                |
//! | radio           | `checked = (element value == value)`   | string, if checked  |
//! | number / range  | `value = String(value)`                | leading float / NaN |
//! | text, textarea, select | `value = String(value)`         | string              |
//! | anything else   | text content (inner HTML with `html`)  | none                |
//!
//! Null and missing values render as the empty string. A path whose parent
//! does not resolve when the binding is made is tolerated: the element shows
//! the empty string and the binding stays inert.

mod element;
mod memory;

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::reactive::{Reactive, Subscription};
use crate::value::Value;

pub use element::{Element, ElementKind, EventHandler};
pub use memory::MemoryElement;

/// Options for [`bind`] and [`bind_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOptions {
    /// Write user edits back into the model.
    pub two_way: bool,
    /// Render content elements through inner HTML instead of text content.
    pub html: bool,
    /// Marker attribute for [`bind_all`]. `None` uses the store's
    /// configured attribute.
    pub attribute: Option<String>,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            two_way: true,
            html: false,
            attribute: None,
        }
    }
}

impl BindOptions {
    pub fn one_way() -> Self {
        Self {
            two_way: false,
            ..Self::default()
        }
    }
}

/// Handle returned by [`bind`] and [`bind_all`].
///
/// Like a [`Subscription`], dropping it keeps the binding alive.
#[derive(Clone)]
#[must_use = "dropping a Binding leaves it attached; call unbind() to detach it"]
pub struct Binding {
    subscription: Subscription,
    elements: usize,
}

impl Binding {
    /// Detach the model watcher and the element listener. Safe to call more
    /// than once.
    pub fn unbind(&self) {
        self.subscription.unsubscribe();
    }

    pub fn is_bound(&self) -> bool {
        self.subscription.is_active()
    }

    /// Number of elements this handle covers.
    pub fn elements(&self) -> usize {
        self.elements
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("elements", &self.elements)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Bind `element` to `path` below `model`.
pub fn bind(
    element: Arc<dyn Element>,
    model: &Reactive,
    path: &str,
    options: &BindOptions,
) -> Binding {
    let kind = ElementKind::of(element.as_ref());
    let html = options.html;
    render(element.as_ref(), kind, model.get_path(path), html);

    let view = element.clone();
    let watcher = model.watch_path(path, move |event| {
        render(view.as_ref(), kind, event.new_value.clone(), html);
    });
    let mut parts = vec![watcher];

    match kind.input_event() {
        Some(event) if options.two_way => {
            let writer = model.clone();
            let write_path = path.to_owned();
            let handler: EventHandler = Arc::new(move |source: &dyn Element| {
                write_back(source, kind, &writer, &write_path);
            });
            let id = element.add_event_listener(event, handler);
            let el = element.clone();
            parts.push(Subscription::new(move || {
                el.remove_event_listener(event, id);
            }));
        }
        _ => {}
    }

    debug!(
        target_id = %model.id(),
        path,
        ?kind,
        two_way = options.two_way && kind.is_form_control(),
        "bound element"
    );
    Binding {
        subscription: Subscription::merge(parts),
        elements: 1,
    }
}

/// Bind every descendant of `container` that carries the marker attribute.
/// The attribute's value is the path.
pub fn bind_all(container: &dyn Element, model: &Reactive, options: &BindOptions) -> Binding {
    let attribute = options
        .attribute
        .clone()
        .unwrap_or_else(|| model.store().config().bind_attribute.clone());

    let mut parts = Vec::new();
    for element in container.query_all(&attribute) {
        let path = element.attribute(&attribute).unwrap_or_default();
        if path.trim().is_empty() {
            warn!(attribute = %attribute, tag = %element.tag_name(), "skipping element with empty binding path");
            continue;
        }
        parts.push(bind(element, model, &path, options).subscription);
    }

    debug!(attribute = %attribute, count = parts.len(), "bound container");
    Binding {
        elements: parts.len(),
        subscription: Subscription::merge(parts),
    }
}

fn render(element: &dyn Element, kind: ElementKind, value: Option<Value>, html: bool) {
    let value = value.unwrap_or_default();
    match kind {
        ElementKind::Checkbox => element.set_checked(value.is_truthy()),
        ElementKind::Radio => {
            let checked = element.value() == value.to_display_string();
            element.set_checked(checked);
        }
        ElementKind::Number | ElementKind::Text | ElementKind::TextArea | ElementKind::Select => {
            element.set_value(&value.to_display_string())
        }
        ElementKind::Content if html => element.set_inner_html(&value.to_display_string()),
        ElementKind::Content => element.set_text_content(&value.to_display_string()),
    }
}

fn write_back(element: &dyn Element, kind: ElementKind, model: &Reactive, path: &str) {
    let value = match kind {
        ElementKind::Checkbox => Value::Bool(element.checked()),
        ElementKind::Number => Value::Number(parse_float(&element.value())),
        ElementKind::Radio => {
            if !element.checked() {
                return;
            }
            Value::String(element.value())
        }
        _ => Value::String(element.value()),
    };

    match model.set_path(path, value) {
        Ok(true) => trace!(target_id = %model.id(), path, "binding wrote back"),
        Ok(false) => {}
        Err(error) => warn!(target_id = %model.id(), path, %error, "binding write-back rejected"),
    }
}

/// Parse the longest leading decimal number, ignoring leading whitespace.
/// `"3.5kg"` gives 3.5; no leading number gives NaN.
fn parse_float(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    end = digits_from(end);
    let mut mantissa = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa += frac_end - (end + 1);
        if mantissa > 0 {
            end = frac_end;
        }
    }
    if mantissa == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::reactive::{ComputedDescriptors, Store};
    use crate::value::Target;
    use serde_json::json;

    fn model(store: &Store, json: serde_json::Value) -> Reactive {
        store.wrap(&Target::from_json(json).unwrap())
    }

    #[test]
    fn text_input_round_trip() {
        let store = Store::new();
        let state = model(&store, json!({ "name": "" }));
        let input = MemoryElement::input("text").shared();

        let binding = bind(input.clone(), &state, "name", &BindOptions::default());
        assert_eq!(input.value(), "");

        input.type_value("Ada", "input");
        assert_eq!(state.get("name"), Some(Value::from("Ada")));

        state.set("name", "Grace").unwrap();
        assert_eq!(input.value(), "Grace");

        binding.unbind();
    }

    #[test]
    fn renders_numbers_like_strings() {
        let store = Store::new();
        let state = model(&store, json!({ "n": 3, "x": null }));
        let span = MemoryElement::new("span").shared();
        let other = MemoryElement::new("span").shared();

        let _a = bind(span.clone(), &state, "n", &BindOptions::default());
        let _b = bind(other.clone(), &state, "x", &BindOptions::default());
        assert_eq!(span.text_content(), "3");
        assert_eq!(other.text_content(), "");

        state.set("n", 2.5).unwrap();
        assert_eq!(span.text_content(), "2.5");
        state.delete("n").unwrap();
        assert_eq!(span.text_content(), "");
    }

    #[test]
    fn html_option_uses_inner_html() {
        let store = Store::new();
        let state = model(&store, json!({ "body": "<b>hi</b>" }));
        let div = MemoryElement::new("div").shared();
        let options = BindOptions {
            html: true,
            ..BindOptions::default()
        };

        let _binding = bind(div.clone(), &state, "body", &options);
        assert_eq!(div.inner_html(), "<b>hi</b>");
        assert_eq!(div.text_content(), "");
        // Content elements never write back.
        assert_eq!(div.listener_count(), 0);
    }

    #[test]
    fn checkbox_binds_checked() {
        let store = Store::new();
        let state = model(&store, json!({ "done": 1 }));
        let checkbox = MemoryElement::input("checkbox").shared();

        let _binding = bind(checkbox.clone(), &state, "done", &BindOptions::default());
        assert!(checkbox.checked());

        checkbox.click(false);
        assert_eq!(state.get("done"), Some(Value::from(false)));
    }

    #[test]
    fn radio_group_selects_matching_value() {
        let store = Store::new();
        let state = model(&store, json!({ "size": "m" }));
        let small = MemoryElement::input("radio").with_value("s").shared();
        let medium = MemoryElement::input("radio").with_value("m").shared();

        let _a = bind(small.clone(), &state, "size", &BindOptions::default());
        let _b = bind(medium.clone(), &state, "size", &BindOptions::default());
        assert!(!small.checked());
        assert!(medium.checked());

        small.click(true);
        assert_eq!(state.get("size"), Some(Value::from("s")));
        assert!(!medium.checked());

        // An unchecked radio does not write.
        medium.click(false);
        assert_eq!(state.get("size"), Some(Value::from("s")));
    }

    #[test]
    fn number_input_writes_numbers() {
        let store = Store::new();
        let state = model(&store, json!({ "age": 1 }));
        let input = MemoryElement::input("number").shared();

        let _binding = bind(input.clone(), &state, "age", &BindOptions::default());
        assert_eq!(input.value(), "1");

        input.type_value("42", "input");
        assert_eq!(state.get("age"), Some(Value::from(42)));

        input.type_value("abc", "input");
        assert!(state.get("age").and_then(|v| v.as_f64()).unwrap().is_nan());
    }

    #[test]
    fn select_listens_for_change_only() {
        let store = Store::new();
        let state = model(&store, json!({ "color": "red" }));
        let select = MemoryElement::new("select").shared();

        let _binding = bind(select.clone(), &state, "color", &BindOptions::default());
        assert_eq!(select.value(), "red");

        assert_eq!(select.type_value("blue", "input"), 0);
        assert_eq!(state.get("color"), Some(Value::from("red")));

        assert_eq!(select.type_value("blue", "change"), 1);
        assert_eq!(state.get("color"), Some(Value::from("blue")));
    }

    #[test]
    fn one_way_binding_adds_no_listener() {
        let store = Store::new();
        let state = model(&store, json!({ "name": "a" }));
        let input = MemoryElement::input("text").shared();

        let _binding = bind(input.clone(), &state, "name", &BindOptions::one_way());
        assert_eq!(input.listener_count(), 0);

        input.type_value("b", "input");
        assert_eq!(state.get("name"), Some(Value::from("a")));
        state.set("name", "c").unwrap();
        assert_eq!(input.value(), "c");
    }

    #[test]
    fn unbind_detaches_both_sides() {
        let store = Store::new();
        let state = model(&store, json!({ "name": "a" }));
        let input = MemoryElement::input("text").shared();

        let binding = bind(input.clone(), &state, "name", &BindOptions::default());
        assert!(binding.is_bound());
        assert_eq!(input.listener_count(), 1);

        binding.unbind();
        binding.unbind();
        assert!(!binding.is_bound());
        assert_eq!(input.listener_count(), 0);
        assert_eq!(store.listener_counts(state.target()), Some((0, 0, 0)));

        state.set("name", "b").unwrap();
        assert_eq!(input.value(), "a");
    }

    #[test]
    fn nested_path_binding() {
        let store = Store::new();
        let state = model(&store, json!({ "user": { "profile": { "name": "ada" } } }));
        let input = MemoryElement::input("text").shared();

        let _binding = bind(input.clone(), &state, "user.profile.name", &BindOptions::default());
        assert_eq!(input.value(), "ada");

        state
            .child("user")
            .and_then(|u| u.child("profile"))
            .unwrap()
            .set("name", "grace")
            .unwrap();
        assert_eq!(input.value(), "grace");

        input.type_value("linus", "input");
        assert_eq!(
            state.get_path("user.profile.name"),
            Some(Value::from("linus"))
        );
    }

    #[test]
    fn unresolved_path_is_inert() {
        let store = Store::new();
        let state = model(&store, json!({}));
        let input = MemoryElement::input("text").with_value("stale").shared();

        let binding = bind(input.clone(), &state, "user.name", &BindOptions::default());
        assert_eq!(input.value(), "");

        input.type_value("x", "input");
        assert_eq!(state.get("user"), None);
        binding.unbind();
    }

    #[test]
    fn write_back_to_computed_key_is_rejected_quietly() {
        let store = Store::new();
        let state = model(&store, json!({ "a": 1 }));
        let view = state.computed(ComputedDescriptors::new().define("double", |s| {
            s.get("a").and_then(|v| v.as_f64()).unwrap_or(0.0) * 2.0
        }));
        let input = MemoryElement::input("number").shared();

        let _binding = bind(input.clone(), &view, "double", &BindOptions::default());
        assert_eq!(input.value(), "2");

        input.type_value("10", "input");
        assert_eq!(view.get("double"), Some(Value::from(2)));

        view.set("a", 4).unwrap();
        assert_eq!(input.value(), "8");
    }

    #[test]
    fn bind_all_binds_marked_descendants() {
        let store = Store::new();
        let state = model(&store, json!({ "first": "a", "last": "b" }));
        let form = MemoryElement::new("form");
        let first = MemoryElement::input("text").with_attribute("data-bind", "first").shared();
        let last = MemoryElement::new("span").with_attribute("data-bind", "last").shared();
        let ignored = MemoryElement::input("text").with_value("keep").shared();
        form.append_child(first.clone());
        form.append_child(last.clone());
        form.append_child(ignored.clone());

        let binding = bind_all(&form, &state, &BindOptions::default());
        assert_eq!(binding.elements(), 2);
        assert_eq!(first.value(), "a");
        assert_eq!(last.text_content(), "b");
        assert_eq!(ignored.value(), "keep");

        binding.unbind();
        assert_eq!(first.listener_count(), 0);
        state.set("last", "z").unwrap();
        assert_eq!(last.text_content(), "b");
    }

    #[test]
    fn bind_all_uses_configured_attribute() {
        let config = StoreConfig::from_json(r#"{ "bindAttribute": "data-model" }"#).unwrap();
        let store = Store::with_config(config);
        let state = model(&store, json!({ "x": 1 }));
        let root = MemoryElement::new("div");
        let marked = MemoryElement::new("span").with_attribute("data-model", "x").shared();
        let default_marked = MemoryElement::new("span").with_attribute("data-bind", "x").shared();
        root.append_child(marked.clone());
        root.append_child(default_marked.clone());

        let binding = bind_all(&root, &state, &BindOptions::default());
        assert_eq!(binding.elements(), 1);
        assert_eq!(marked.text_content(), "1");
        assert_eq!(default_marked.text_content(), "");
    }

    #[test]
    fn parse_float_takes_leading_number() {
        assert_eq!(parse_float("42"), 42.0);
        assert_eq!(parse_float("  -3.5kg"), -3.5);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("5."), 5.0);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("2e"), 2.0);
        assert_eq!(parse_float("Infinity"), f64::INFINITY);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("").is_nan());
        assert!(parse_float("abc").is_nan());
        assert!(parse_float(".").is_nan());
        assert!(parse_float("-").is_nan());
    }
}
