//! Handler Registry
//!
//! Each reactive target owns three listener lists: `get`, `set` and
//! `delete`. Everything above the proxy (watchers, computed keys, bindings)
//! is built out of entries in these lists.
//!
//! Dispatch snapshots the list before invoking anything, so a listener may
//! write to the same target, add listeners, or remove itself while a
//! notification is in flight. Listeners added during a dispatch are first
//! called on the next one; listeners removed during a dispatch are not
//! called again, even if they had not been reached yet.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::subscriber::ListenerId;
use crate::value::{TargetId, Value};

/// Called with the key that was read.
pub type GetListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Called with `(key, new_value, old_value)`; `old_value` is `None` for a new key.
pub type SetListener = Arc<dyn Fn(&str, &Value, Option<&Value>) + Send + Sync>;

/// Called with `(key, removed_value)`.
pub type DeleteListener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

type Slots<L> = RwLock<Vec<(ListenerId, L)>>;

/// Listener lists for one target.
pub struct HandlerRegistry {
    target: TargetId,
    get: Slots<GetListener>,
    set: Slots<SetListener>,
    delete: Slots<DeleteListener>,
}

impl HandlerRegistry {
    pub fn new(target: TargetId) -> Self {
        Self {
            target,
            get: RwLock::new(Vec::new()),
            set: RwLock::new(Vec::new()),
            delete: RwLock::new(Vec::new()),
        }
    }

    /// The target these listeners belong to.
    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn on_get<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.get.write().push((id, Arc::new(listener)));
        id
    }

    pub fn on_set<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str, &Value, Option<&Value>) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.set.write().push((id, Arc::new(listener)));
        id
    }

    pub fn on_delete<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.delete.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener from whichever list holds it.
    ///
    /// Returns `false` if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        remove_from(&self.get, id) || remove_from(&self.set, id) || remove_from(&self.delete, id)
    }

    pub fn emit_get(&self, key: &str) {
        for (id, listener) in snapshot(&self.get) {
            if is_registered(&self.get, id) {
                listener(key);
            }
        }
    }

    pub fn emit_set(&self, key: &str, new_value: &Value, old_value: Option<&Value>) {
        for (id, listener) in snapshot(&self.set) {
            if is_registered(&self.set, id) {
                listener(key, new_value, old_value);
            }
        }
    }

    pub fn emit_delete(&self, key: &str, old_value: &Value) {
        for (id, listener) in snapshot(&self.delete) {
            if is_registered(&self.delete, id) {
                listener(key, old_value);
            }
        }
    }

    /// Number of `(get, set, delete)` listeners currently registered.
    pub fn listener_counts(&self) -> (usize, usize, usize) {
        (self.get.read().len(), self.set.read().len(), self.delete.read().len())
    }

    /// Whether any listener is registered at all.
    pub fn is_empty(&self) -> bool {
        self.listener_counts() == (0, 0, 0)
    }
}

fn remove_from<L>(slots: &Slots<L>, id: ListenerId) -> bool {
    let mut slots = slots.write();
    let before = slots.len();
    slots.retain(|(slot_id, _)| *slot_id != id);
    slots.len() != before
}

fn snapshot<L: Clone>(slots: &Slots<L>) -> Vec<(ListenerId, L)> {
    slots.read().clone()
}

fn is_registered<L>(slots: &Slots<L>, id: ListenerId) -> bool {
    slots.read().iter().any(|(slot_id, _)| *slot_id == id)
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (get, set, delete) = self.listener_counts();
        f.debug_struct("HandlerRegistry")
            .field("target", &self.target)
            .field("get", &get)
            .field("set", &set)
            .field("delete", &delete)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Target;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn registry() -> Arc<HandlerRegistry> {
        Arc::new(HandlerRegistry::new(Target::record().id()))
    }

    #[test]
    fn set_listeners_receive_new_and_old_values() {
        let registry = registry();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        registry.on_set(move |key, new, old| {
            seen_clone
                .lock()
                .push((key.to_string(), new.clone(), old.cloned()));
        });

        registry.emit_set("x", &Value::from(5), Some(&Value::from(3)));
        registry.emit_set("y", &Value::from(1), None);

        assert_eq!(
            *seen.lock(),
            vec![
                ("x".to_string(), Value::from(5), Some(Value::from(3))),
                ("y".to_string(), Value::from(1), None),
            ]
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = registry();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let id = registry.on_delete(move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        registry.emit_delete("x", &Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn listener_may_remove_itself_during_dispatch() {
        let registry = registry();
        let calls = Arc::new(AtomicI32::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let registry_clone = registry.clone();
        let calls_clone = calls.clone();
        let own_id_clone = own_id.clone();
        let id = registry.on_get(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *own_id_clone.lock() {
                registry_clone.remove(id);
            }
        });
        *own_id.lock() = Some(id);

        registry.emit_get("a");
        registry.emit_get("a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_removed_by_an_earlier_one_is_skipped() {
        let registry = registry();
        let victim = Arc::new(Mutex::new(None));
        let victim_calls = Arc::new(AtomicI32::new(0));

        let registry_clone = registry.clone();
        let victim_clone = victim.clone();
        registry.on_set(move |_, _, _| {
            if let Some(id) = victim_clone.lock().take() {
                registry_clone.remove(id);
            }
        });
        let calls_clone = victim_calls.clone();
        let id = registry.on_set(move |_, _, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        *victim.lock() = Some(id);

        registry.emit_set("x", &Value::from(1), None);
        assert_eq!(victim_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.listener_counts(), (0, 1, 0));
    }

    #[test]
    fn listeners_added_during_dispatch_wait_for_next_round() {
        let registry = registry();
        let late_calls = Arc::new(AtomicI32::new(0));

        let registry_clone = registry.clone();
        let late_clone = late_calls.clone();
        registry.on_get(move |_| {
            let late = late_clone.clone();
            registry_clone.on_get(move |_| {
                late.fetch_add(1, Ordering::SeqCst);
            });
        });

        registry.emit_get("a");
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        registry.emit_get("a");
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }
}
