//! Plain containers.
//!
//! A [`Target`] is a shared handle to a record or a sequence. Cloning the
//! handle shares the container; identity is the allocation, exposed as a
//! [`TargetId`] for keyed lookups in the store.
//!
//! Mutating a target directly never notifies anyone. Once a target has been
//! wrapped by a store, writes should go through its proxy.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Value;
use crate::error::{ReactiveError, Result};

/// Counter for generating unique target IDs.
static TARGET_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_target_id() -> TargetId {
    TargetId(TARGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Identity of a container. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How far past the end of a sequence a single write may reach.
pub const MAX_SEQUENCE_GAP: usize = 1 << 16;

/// Parse a canonical decimal sequence index (`"0"`, `"12"`, but not `"01"`).
pub(crate) fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse().ok()
}

/// The storage behind a target.
#[derive(Debug, Clone)]
pub enum Container {
    /// Keyed fields, in insertion order.
    Record(IndexMap<String, Value>),
    /// Index-addressed elements.
    Sequence(Vec<Value>),
}

impl Container {
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Container::Record(fields) => fields.get(key),
            Container::Sequence(items) => parse_index(key).and_then(|i| items.get(i)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Container::Record(fields) => fields.len(),
            Container::Sequence(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        match self {
            Container::Record(fields) => fields.keys().cloned().collect(),
            Container::Sequence(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        }
    }

    /// Write `value` under `key`, returning the previous value.
    ///
    /// Writing past the end of a sequence pads the gap with nulls, up to
    /// [`MAX_SEQUENCE_GAP`] elements.
    fn insert(&mut self, key: &str, value: Value) -> Result<Option<Value>> {
        match self {
            Container::Record(fields) => Ok(fields.insert(key.to_owned(), value)),
            Container::Sequence(items) => {
                let index = parse_index(key)
                    .filter(|&i| i.saturating_sub(items.len()) <= MAX_SEQUENCE_GAP)
                    .ok_or_else(|| ReactiveError::InvalidKey {
                        key: key.to_owned(),
                    })?;
                if index < items.len() {
                    Ok(Some(std::mem::replace(&mut items[index], value)))
                } else {
                    items.resize(index, Value::Null);
                    items.push(value);
                    Ok(None)
                }
            }
        }
    }

    /// Remove `key`, returning the removed value.
    ///
    /// Sequence elements leave a null hole so later indices keep their keys.
    fn remove(&mut self, key: &str) -> Option<Value> {
        match self {
            Container::Record(fields) => fields.shift_remove(key),
            Container::Sequence(items) => parse_index(key)
                .filter(|&i| i < items.len())
                .map(|i| std::mem::replace(&mut items[i], Value::Null)),
        }
    }

    /// Like [`Container::remove`], but removing the last element of a
    /// sequence shortens it instead of leaving a hole.
    fn remove_trailing(&mut self, key: &str) -> Option<Value> {
        match self {
            Container::Sequence(items)
                if parse_index(key).is_some_and(|i| i + 1 == items.len()) =>
            {
                items.pop()
            }
            _ => self.remove(key),
        }
    }
}

struct TargetCell {
    id: TargetId,
    frozen: AtomicBool,
    data: RwLock<Container>,
}

/// Shared handle to a plain record or sequence.
#[derive(Clone)]
pub struct Target(Arc<TargetCell>);

impl Target {
    fn from_container(container: Container) -> Self {
        Self(Arc::new(TargetCell {
            id: next_target_id(),
            frozen: AtomicBool::new(false),
            data: RwLock::new(container),
        }))
    }

    /// Create an empty record.
    pub fn record() -> Self {
        Self::from_container(Container::Record(IndexMap::new()))
    }

    /// Create an empty sequence.
    pub fn sequence() -> Self {
        Self::from_container(Container::Sequence(Vec::new()))
    }

    /// Create a record from key/value pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_container(Container::Record(fields))
    }

    /// Create a sequence from values.
    pub fn from_values<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::from_container(Container::Sequence(
            values.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    /// Whether two handles refer to the same container.
    pub fn ptr_eq(a: &Target, b: &Target) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn downgrade(&self) -> WeakTarget {
        WeakTarget(Arc::downgrade(&self.0))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(*self.0.data.read(), Container::Sequence(_))
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.load(Ordering::Acquire)
    }

    /// Freeze this container only. See [`crate::immutable::freeze`] for the
    /// recursive version.
    pub fn freeze_shallow(&self) {
        self.0.frozen.store(true, Ordering::Release);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.data.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.data.read().get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.data.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.data.read().keys()
    }

    /// Snapshot of the values, in key order.
    pub fn values(&self) -> Vec<Value> {
        match &*self.0.data.read() {
            Container::Record(fields) => fields.values().cloned().collect(),
            Container::Sequence(items) => items.clone(),
        }
    }

    /// Snapshot of the entries, in key order.
    ///
    /// Recursive walks go through this copy so that no lock is held while a
    /// nested (possibly identical) container is visited.
    pub fn entries(&self) -> Vec<(String, Value)> {
        match &*self.0.data.read() {
            Container::Record(fields) => fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Container::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
        }
    }

    /// Write a value, returning the previous one.
    pub fn insert(&self, key: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        let value = value.into();
        self.ensure_mutable()?;
        self.0.data.write().insert(key, value)
    }

    /// Remove a key, returning the removed value if there was one.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        self.ensure_mutable()?;
        Ok(self.0.data.write().remove(key))
    }

    /// Remove a key; the last element of a sequence is popped rather than
    /// left as a null hole.
    pub(crate) fn remove_trailing(&self, key: &str) -> Result<Option<Value>> {
        self.ensure_mutable()?;
        Ok(self.0.data.write().remove_trailing(key))
    }

    /// A new, unfrozen container holding the same child references.
    pub fn shallow_copy(&self) -> Target {
        let container = self.0.data.read().clone();
        Self::from_container(container)
    }

    /// Replace the contents wholesale, bypassing the frozen check.
    ///
    /// Only used to fill a copy that was registered before its children
    /// were copied.
    pub(crate) fn replace_contents(&self, container: Container) {
        *self.0.data.write() = container;
    }

    /// An empty, unfrozen container of the same kind.
    pub(crate) fn empty_like(&self) -> Target {
        if self.is_sequence() {
            Target::sequence()
        } else {
            Target::record()
        }
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.is_frozen() {
            Err(ReactiveError::Frozen(self.id()))
        } else {
            Ok(())
        }
    }
}

/// Identity equality, the same comparison as [`Value::same`].
impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        Target::ptr_eq(self, other)
    }
}

impl Eq for Target {}

impl fmt::Debug for Target {
    // Children are not printed: containers may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("kind", &if self.is_sequence() { "sequence" } else { "record" })
            .field("len", &self.len())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// Non-owning handle to a target.
#[derive(Clone)]
pub struct WeakTarget(Weak<TargetCell>);

impl WeakTarget {
    pub fn upgrade(&self) -> Option<Target> {
        self.0.upgrade().map(Target)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakTarget")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let a = Target::record();
        let b = Target::record();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn record_preserves_insertion_order() {
        let t = Target::record();
        t.insert("b", 1).unwrap();
        t.insert("a", 2).unwrap();
        t.insert("c", 3).unwrap();
        assert_eq!(t.keys(), vec!["b", "a", "c"]);

        t.remove("a").unwrap();
        assert_eq!(t.keys(), vec!["b", "c"]);
    }

    #[test]
    fn insert_returns_previous_value() {
        let t = Target::from_pairs([("x", 1)]);
        assert_eq!(t.insert("x", 2).unwrap(), Some(Value::from(1)));
        assert_eq!(t.insert("y", 3).unwrap(), None);
    }

    #[test]
    fn sequence_uses_decimal_indices() {
        let t = Target::from_values([1, 2]);
        assert_eq!(t.get("1"), Some(Value::from(2)));
        assert_eq!(t.get("01"), None);
        assert_eq!(t.get("x"), None);

        assert_eq!(
            t.insert("x", 5),
            Err(ReactiveError::InvalidKey { key: "x".into() })
        );

        // Writing past the end pads with nulls.
        t.insert("4", 9).unwrap();
        assert_eq!(t.len(), 5);
        assert_eq!(t.get("3"), Some(Value::Null));
    }

    #[test]
    fn sequence_writes_far_past_the_end_are_rejected() {
        let t = Target::from_values([1]);
        let far = (1 + MAX_SEQUENCE_GAP + 1).to_string();
        assert_eq!(
            t.insert(&far, 2),
            Err(ReactiveError::InvalidKey { key: far.clone() })
        );
        assert_eq!(
            t.insert("18446744073709551615", 2),
            Err(ReactiveError::InvalidKey {
                key: "18446744073709551615".into()
            })
        );
        assert_eq!(t.len(), 1);

        // The largest allowed gap still pads.
        t.insert(&(1 + MAX_SEQUENCE_GAP).to_string(), 2).unwrap();
        assert_eq!(t.len(), MAX_SEQUENCE_GAP + 2);
    }

    #[test]
    fn remove_trailing_pops_the_last_element() {
        let t = Target::from_values([1, 2, 3]);
        assert_eq!(t.remove_trailing("2").unwrap(), Some(Value::from(3)));
        assert_eq!(t.len(), 2);

        // Anywhere else it still leaves a hole.
        assert_eq!(t.remove_trailing("0").unwrap(), Some(Value::from(1)));
        assert_eq!(t.len(), 2);
        assert_eq!(t.get("0"), Some(Value::Null));
    }

    #[test]
    fn equality_is_identity() {
        let a = Target::from_pairs([("x", 1)]);
        let b = Target::from_pairs([("x", 1)]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn sequence_remove_leaves_a_hole() {
        let t = Target::from_values([1, 2, 3]);
        assert_eq!(t.remove("1").unwrap(), Some(Value::from(2)));
        assert_eq!(t.len(), 3);
        assert_eq!(t.get("1"), Some(Value::Null));
        assert_eq!(t.remove("7").unwrap(), None);
    }

    #[test]
    fn frozen_targets_reject_writes() {
        let t = Target::from_pairs([("x", 1)]);
        t.freeze_shallow();
        assert_eq!(t.insert("x", 2), Err(ReactiveError::Frozen(t.id())));
        assert_eq!(t.remove("x"), Err(ReactiveError::Frozen(t.id())));
        assert_eq!(t.get("x"), Some(Value::from(1)));

        let copy = t.shallow_copy();
        assert!(!copy.is_frozen());
        copy.insert("x", 2).unwrap();
    }

    #[test]
    fn weak_target_does_not_keep_container_alive() {
        let t = Target::record();
        let weak = t.downgrade();
        assert!(weak.upgrade().is_some());
        drop(t);
        assert!(weak.upgrade().is_none());
    }
}
