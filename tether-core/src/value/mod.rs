//! Value Model
//!
//! Everything the engine stores is a [`Value`]: a primitive, a reference to a
//! plain container ([`Target`]), or an opaque host value.
//!
//! # Equality
//!
//! `Value` equality follows `Object.is` semantics rather than structural
//! equality:
//!
//! - numbers compare by value, except that `NaN` equals `NaN` and `+0` differs
//!   from `-0`
//! - containers and opaque values compare by identity
//!
//! This is the comparison the reactive store uses to decide whether a write is
//! a no-op, so a listener that writes back the value it just observed settles
//! instead of looping.

mod json;
mod target;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use target::{Container, Target, TargetId, WeakTarget, MAX_SEQUENCE_GAP};
pub(crate) use target::parse_index;

/// A value stored in a container or carried by a change notification.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A plain record or sequence, shared by reference.
    Object(Target),
    /// A host value that is never destructured (copied or frozen) by the engine.
    Opaque(Opaque),
}

impl Value {
    /// `Object.is` comparison.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => same_number(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Target::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => Opaque::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The container behind this value, if it is one.
    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is a record or sequence.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// JavaScript truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Opaque(_) => true,
        }
    }

    /// Render the value the way `String(value)` would, with null rendering as
    /// the empty string.
    pub fn to_display_string(&self) -> String {
        let mut seen = Vec::new();
        display_into(self, &mut seen)
    }

    /// Short name of the variant, used in log output.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(target) if target.is_sequence() => "sequence",
            Value::Object(_) => "record",
            Value::Opaque(_) => "opaque",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

fn same_number(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a == b && a.is_sign_negative() == b.is_sign_negative()
}

/// Format a number like JavaScript's `Number.prototype.toString`.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let label = if n > 0.0 { "Infinity" } else { "-Infinity" };
        label.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

fn display_into(value: &Value, seen: &mut Vec<TargetId>) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.clone(),
        Value::Opaque(_) => "[object Object]".to_string(),
        Value::Object(target) if target.is_sequence() => {
            // Arrays join their elements; a sequence that contains itself
            // renders the inner reference as empty.
            if seen.contains(&target.id()) {
                return String::new();
            }
            seen.push(target.id());
            let parts: Vec<String> = target
                .values()
                .iter()
                .map(|item| display_into(item, seen))
                .collect();
            seen.pop();
            parts.join(",")
        }
        Value::Object(_) => "[object Object]".to_string(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<&Target> for Value {
    fn from(target: &Target) -> Self {
        Value::Object(target.clone())
    }
}

impl From<Opaque> for Value {
    fn from(opaque: Opaque) -> Self {
        Value::Opaque(opaque)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A host value carried by reference.
///
/// Opaque values are the analogue of class instances: copies and freezes
/// leave them untouched, and equality is identity.
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(a: &Opaque, b: &Opaque) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&a.0) as *const (),
            Arc::as_ptr(&b.0) as *const (),
        )
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_equality_follows_object_is() {
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_ne!(Value::from(0.0), Value::from(-0.0));
        assert_eq!(Value::from(3), Value::from(3.0));
        assert_ne!(Value::from(1), Value::from("1"));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Target::record();
        let b = Target::record();
        assert_eq!(Value::from(&a), Value::from(&a));
        assert_ne!(Value::from(&a), Value::from(&b));
    }

    #[test]
    fn opaque_values_compare_by_identity() {
        let a = Opaque::new(5u8);
        let b = Opaque::new(5u8);
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b.clone()));
        assert_eq!(b.downcast_ref::<u8>(), Some(&5));
    }

    #[test]
    fn display_matches_javascript_string_conversion() {
        assert_eq!(Value::from(3.0).to_display_string(), "3");
        assert_eq!(Value::from(1.5).to_display_string(), "1.5");
        assert_eq!(Value::from(f64::NAN).to_display_string(), "NaN");
        assert_eq!(Value::from(f64::NEG_INFINITY).to_display_string(), "-Infinity");
        assert_eq!(Value::Null.to_display_string(), "");
        assert_eq!(Value::from(true).to_display_string(), "true");

        let items = Target::from_values([Value::from(1), Value::from("a")]);
        assert_eq!(Value::from(items).to_display_string(), "1,a");
        assert_eq!(Value::from(Target::record()).to_display_string(), "[object Object]");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::from(Target::record()).is_truthy());
    }
}
