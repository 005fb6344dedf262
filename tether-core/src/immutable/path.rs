//! Copy-on-write path access.
//!
//! Paths are dot-separated keys; sequence elements are addressed by their
//! decimal index (`"todos.0.done"`). Every writer returns a new root and
//! leaves its input untouched.

use super::split_path;
use crate::error::{ReactiveError, Result};
use crate::value::{Target, Value};

fn empty_path(path: &str) -> ReactiveError {
    ReactiveError::InvalidPath {
        path: path.to_owned(),
        reason: "path is empty",
    }
}

/// Read the value at `path`. The empty path is the root itself.
///
/// Returns `None` if any segment is missing or walks through a primitive.
pub fn get_path(root: &Target, path: &str) -> Option<Value> {
    let mut current = Value::Object(root.clone());
    for segment in split_path(path) {
        current = current.as_target()?.get(segment)?;
    }
    Some(current)
}

/// Return a new root with `value` written at `path`.
///
/// Missing intermediates, and intermediates holding a primitive, are
/// replaced by fresh records.
pub fn set_path(root: &Target, path: &str, value: impl Into<Value>) -> Result<Target> {
    let segments = split_path(path);
    let Some((head, rest)) = segments.split_first() else {
        return Err(empty_path(path));
    };
    set_in(root, head, rest, value.into())
}

fn set_in(node: &Target, head: &str, rest: &[&str], value: Value) -> Result<Target> {
    let value = match rest.split_first() {
        None => value,
        Some((next, rest)) => {
            let child = match node.get(head) {
                Some(Value::Object(child)) => child,
                _ => Target::record(),
            };
            Value::Object(set_in(&child, next, rest, value)?)
        }
    };
    let copy = node.shallow_copy();
    copy.insert(head, value)?;
    Ok(copy)
}

/// Return a new root without the key at `path`.
///
/// If nothing is stored at `path` the root is returned unchanged (the same
/// handle, not a copy).
pub fn delete_path(root: &Target, path: &str) -> Result<Target> {
    let segments = split_path(path);
    let Some((head, rest)) = segments.split_first() else {
        return Err(empty_path(path));
    };
    if get_path(root, path).is_none() {
        return Ok(root.clone());
    }
    delete_in(root, head, rest, false)
}

/// [`delete_path`], except that deleting the last element of a sequence
/// shortens it.
pub(crate) fn truncate_path(root: &Target, path: &str) -> Result<Target> {
    let segments = split_path(path);
    let Some((head, rest)) = segments.split_first() else {
        return Err(empty_path(path));
    };
    if get_path(root, path).is_none() {
        return Ok(root.clone());
    }
    delete_in(root, head, rest, true)
}

fn delete_in(node: &Target, head: &str, rest: &[&str], truncate: bool) -> Result<Target> {
    let copy = node.shallow_copy();
    match rest.split_first() {
        None if truncate => {
            copy.remove_trailing(head)?;
        }
        None => {
            copy.remove(head)?;
        }
        Some((next, rest)) => {
            if let Some(Value::Object(child)) = node.get(head) {
                copy.insert(head, delete_in(&child, next, rest, truncate)?)?;
            }
        }
    }
    Ok(copy)
}

/// Return a new root with the entries of `patch` shallow-merged into the
/// container at `path`. The empty path merges into the root.
///
/// A missing or primitive target container is replaced by a fresh record.
pub fn merge_path(root: &Target, path: &str, patch: &Target) -> Result<Target> {
    let segments = split_path(path);
    match segments.split_first() {
        None => merge_into(root, patch),
        Some((head, rest)) => merge_in(root, head, rest, patch),
    }
}

fn merge_into(node: &Target, patch: &Target) -> Result<Target> {
    let copy = node.shallow_copy();
    for (key, value) in patch.entries() {
        copy.insert(&key, value)?;
    }
    Ok(copy)
}

fn merge_in(node: &Target, head: &str, rest: &[&str], patch: &Target) -> Result<Target> {
    let child = match node.get(head) {
        Some(Value::Object(child)) => child,
        _ => Target::record(),
    };
    let merged = match rest.split_first() {
        None => merge_into(&child, patch)?,
        Some((next, rest)) => merge_in(&child, next, rest, patch)?,
    };
    let copy = node.shallow_copy();
    copy.insert(head, merged)?;
    Ok(copy)
}
