//! JSON interop.
//!
//! Snapshots leave the engine as `serde_json::Value`, which is what storage
//! and network collaborators consume. Export fails on cycles instead of
//! recursing forever.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number};

use super::{Target, TargetId, Value};
use crate::error::{ReactiveError, Result};

/// Largest integer a double represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl Value {
    /// Build a value from JSON. Arrays and objects become fresh containers.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Object(Target::from_values(items.into_iter().map(Value::from_json)))
            }
            serde_json::Value::Object(fields) => Value::Object(Target::from_pairs(
                fields.into_iter().map(|(k, v)| (k, Value::from_json(v))),
            )),
        }
    }

    /// Export as JSON.
    ///
    /// Non-finite numbers and opaque values export as `null`, as
    /// `JSON.stringify` would. A container reachable from itself yields
    /// [`ReactiveError::Cycle`].
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut stack = Vec::new();
        export(self, &mut stack)
    }
}

impl Target {
    /// Build a container from a JSON array or object.
    pub fn from_json(json: serde_json::Value) -> Option<Target> {
        match Value::from_json(json) {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Value::Object(self.clone()).to_json()
    }
}

fn export(value: &Value, stack: &mut Vec<TargetId>) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Null | Value::Opaque(_) => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => export_number(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Object(target) => {
            if stack.contains(&target.id()) {
                return Err(ReactiveError::Cycle);
            }
            stack.push(target.id());
            let json = if target.is_sequence() {
                let items = target
                    .values()
                    .iter()
                    .map(|item| export(item, stack))
                    .collect::<Result<Vec<_>>>()?;
                serde_json::Value::Array(items)
            } else {
                let mut fields = Map::new();
                for (key, item) in target.entries() {
                    fields.insert(key, export(&item, stack)?);
                }
                serde_json::Value::Object(fields)
            };
            stack.pop();
            json
        }
    })
}

fn export_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from_json)
    }
}
