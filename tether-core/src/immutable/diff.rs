//! Change records between two snapshots.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::path::{delete_path, get_path, set_path, truncate_path};
use crate::error::Result;
use crate::value::{parse_index, Target, TargetId, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
}

/// One difference between two snapshots.
///
/// For [`diff`] the path is the bare key; for [`deep_diff`] it is the
/// dot-joined path from the compared roots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl Change {
    pub fn add(path: impl Into<String>, new_value: Value) -> Self {
        Self {
            kind: ChangeKind::Add,
            path: path.into(),
            old_value: None,
            new_value: Some(new_value),
        }
    }

    pub fn update(path: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            kind: ChangeKind::Update,
            path: path.into(),
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    pub fn delete(path: impl Into<String>, old_value: Value) -> Self {
        Self {
            kind: ChangeKind::Delete,
            path: path.into(),
            old_value: Some(old_value),
            new_value: None,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| v.as_ref().map(Value::to_display_string).unwrap_or_default();
        match self.kind {
            ChangeKind::Add => write!(f, "+ {} = {}", self.path, show(&self.new_value)),
            ChangeKind::Update => write!(
                f,
                "~ {}: {} -> {}",
                self.path,
                show(&self.old_value),
                show(&self.new_value)
            ),
            ChangeKind::Delete => write!(f, "- {}", self.path),
        }
    }
}

/// Old keys in order, then keys only present in `new`.
fn union_keys(old: &Target, new: &Target) -> Vec<String> {
    let mut keys = old.keys();
    for key in new.keys() {
        if !old.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

fn compare(path: String, old: Option<Value>, new: Option<Value>) -> Option<Change> {
    match (old, new) {
        (None, Some(new)) => Some(Change::add(path, new)),
        (Some(old), None) => Some(Change::delete(path, old)),
        (Some(old), Some(new)) if !old.same(&new) => Some(Change::update(path, old, new)),
        _ => None,
    }
}

/// Shallow diff of two containers, comparing values with `Object.is`.
///
/// A nested container that was replaced by an equal copy still shows up as
/// an update; use [`deep_diff`] to look inside.
pub fn diff(old: &Target, new: &Target) -> Vec<Change> {
    union_keys(old, new)
        .into_iter()
        .filter_map(|key| {
            let (before, after) = (old.get(&key), new.get(&key));
            compare(key, before, after)
        })
        .collect()
}

/// Recursive diff. Keys holding containers of the same kind on both sides are
/// descended into instead of being reported; paths are dot-joined from the
/// roots.
///
/// A subtree reachable under several keys is reported under each of them.
pub fn deep_diff(old: &Target, new: &Target) -> Vec<Change> {
    deep_diff_at(old, new, "")
}

/// [`deep_diff`] with every path prefixed by `prefix`.
pub fn deep_diff_at(old: &Target, new: &Target, prefix: &str) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut in_progress = HashSet::new();
    walk(old, new, prefix, &mut in_progress, &mut changes);
    changes
}

/// `in_progress` holds the pairs on the current descent only; meeting one
/// again means a cycle.
fn walk(
    old: &Target,
    new: &Target,
    prefix: &str,
    in_progress: &mut HashSet<(TargetId, TargetId)>,
    changes: &mut Vec<Change>,
) {
    let pair = (old.id(), new.id());
    if Target::ptr_eq(old, new) || !in_progress.insert(pair) {
        return;
    }

    for key in union_keys(old, new) {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match (old.get(&key), new.get(&key)) {
            (Some(Value::Object(a)), Some(Value::Object(b)))
                if a.is_sequence() == b.is_sequence() =>
            {
                walk(&a, &b, &path, in_progress, changes)
            }
            (before, after) => changes.extend(compare(path, before, after)),
        }
    }
    in_progress.remove(&pair);
}

/// Whether two containers hold the same data, recursively.
pub fn equals(a: &Target, b: &Target) -> bool {
    a.is_sequence() == b.is_sequence() && deep_diff(a, b).is_empty()
}

/// Apply changes to `root` copy-on-write and return the new root.
///
/// Deletes of sequence elements run last, highest index first. A delete of
/// the final element shortens the sequence; anywhere else it leaves a null
/// hole. With that, `patch(old, &deep_diff(old, new))` is structurally equal
/// to `new` for records and sequences alike.
pub fn patch(root: &Target, changes: &[Change]) -> Result<Target> {
    let mut current = root.clone();
    let mut element_deletes = Vec::new();
    for change in changes {
        current = match (&change.kind, &change.new_value) {
            (ChangeKind::Delete, _) | (_, None) => {
                if let Some(position) = sequence_element(&current, &change.path) {
                    element_deletes.push(position);
                    continue;
                }
                delete_path(&current, &change.path)?
            }
            (_, Some(value)) => set_path(&current, &change.path, value.clone())?,
        };
    }

    element_deletes.sort_by_key(|&(parent, index, _)| (parent, Reverse(index)));
    for (_, _, path) in element_deletes {
        current = truncate_path(&current, path)?;
    }
    Ok(current)
}

/// `(parent path, index, full path)` if `path` names an element of a sequence.
fn sequence_element<'a>(root: &Target, path: &'a str) -> Option<(&'a str, usize, &'a str)> {
    let (parent, last) = path.rsplit_once('.').unwrap_or(("", path));
    let index = parse_index(last)?;
    match get_path(root, parent)? {
        Value::Object(container) if container.is_sequence() => Some((parent, index, path)),
        _ => None,
    }
}
