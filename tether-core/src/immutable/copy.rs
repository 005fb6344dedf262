//! Deep copy and deep freeze.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::value::{Container, Target, TargetId, Value};

/// Deep copy a value. Containers are copied recursively; everything else,
/// opaque host values included, is returned as is.
pub fn clone(value: &Value) -> Value {
    match value {
        Value::Object(target) => Value::Object(clone_target(target)),
        other => other.clone(),
    }
}

/// Deep copy a container. Shared and cyclic references are reproduced in
/// the copy.
pub(crate) fn clone_target(target: &Target) -> Target {
    let mut copies = HashMap::new();
    clone_into(target, &mut copies)
}

fn clone_into(target: &Target, copies: &mut HashMap<TargetId, Target>) -> Target {
    if let Some(copy) = copies.get(&target.id()) {
        return copy.clone();
    }

    // Registered before the children are copied so a cycle finds it.
    let copy = target.empty_like();
    copies.insert(target.id(), copy.clone());

    let mut copy_child = |value: Value| match value {
        Value::Object(child) => Value::Object(clone_into(&child, copies)),
        other => other,
    };
    let container = if target.is_sequence() {
        Container::Sequence(target.values().into_iter().map(&mut copy_child).collect())
    } else {
        Container::Record(
            target
                .entries()
                .into_iter()
                .map(|(key, value)| (key, copy_child(value)))
                .collect::<IndexMap<_, _>>(),
        )
    };
    copy.replace_contents(container);
    copy
}

/// Deep freeze a value in place and return it.
///
/// Later writes to any container reachable from it fail with
/// [`ReactiveError::Frozen`](crate::ReactiveError::Frozen), whether they go
/// through a proxy or not.
pub fn freeze(value: &Value) -> Value {
    if let Value::Object(target) = value {
        freeze_target(target);
    }
    value.clone()
}

/// Deep freeze a container in place.
pub fn freeze_target(target: &Target) {
    let mut seen = HashSet::new();
    freeze_into(target, &mut seen);
}

fn freeze_into(target: &Target, seen: &mut HashSet<TargetId>) {
    if !seen.insert(target.id()) {
        return;
    }
    target.freeze_shallow();
    for value in target.values() {
        if let Value::Object(child) = value {
            freeze_into(&child, seen);
        }
    }
}
