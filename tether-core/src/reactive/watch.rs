//! Watch Engine
//!
//! A watcher is a callback attached to a target's `set` and `delete`
//! listeners. It runs synchronously, inside the write that triggered it.
//!
//! # Deep Watching
//!
//! With [`WatchOptions::deep`], assigning a container to a watched property
//! also attaches the same callback to that container, so later writes inside
//! it are reported too. The attachment happens lazily, when the container is
//! assigned; containers already present when `watch` is called are not
//! followed. Reassigning or deleting the property detaches the nested watcher
//! it had.
//!
//! # Path Watching
//!
//! [`Store::watch_path`] resolves `"a.b.c"` down to the container holding `c`
//! and filters its events to the key `c`. A path that does not resolve yet
//! gives an inert subscription instead of an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::store::{Reactive, Store, TargetState, WeakStore};
use super::subscriber::Subscription;
use crate::error::{ReactiveError, Result};
use crate::immutable::split_path;
use crate::value::{Target, Value};

/// Options for [`Store::watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Follow containers assigned to watched properties.
    pub deep: bool,
}

impl WatchOptions {
    pub fn deep() -> Self {
        Self { deep: true }
    }
}

/// What a watcher receives.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// The key that changed.
    pub prop: String,
    /// `None` when the property was deleted.
    pub new_value: Option<Value>,
    /// `None` when the property did not exist before.
    pub old_value: Option<Value>,
    /// The raw target the change happened on.
    pub target: Target,
    pub deleted: bool,
}

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Nested subscriptions created by a deep watcher, keyed by property.
type Nested = Arc<Mutex<HashMap<String, Subscription>>>;

impl Store {
    /// Watch every write and delete made through the target's proxy.
    ///
    /// Fails with [`ReactiveError::NotReactive`] if the target was never
    /// wrapped by this store.
    pub fn watch<F>(&self, target: &Target, callback: F, options: WatchOptions) -> Result<Subscription>
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let state = self
            .state(target.id())
            .ok_or(ReactiveError::NotReactive(target.id()))?;
        Ok(attach(self, state, target, Arc::new(callback), options))
    }

    /// Watch one key at the end of a dot-separated path.
    ///
    /// If a segment before the last does not resolve to a container, the
    /// returned subscription is inert.
    pub fn watch_path<F>(&self, root: &Reactive, path: &str, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let segments = split_path(path);
        let Some((last, parents)) = segments.split_last() else {
            debug!(path, "watch_path on empty path; nothing to watch");
            return Subscription::noop();
        };
        let Some(parent) = root.resolve(parents) else {
            debug!(target_id = %root.id(), path, "watch_path target does not resolve yet");
            return Subscription::noop();
        };

        let key = (*last).to_owned();
        let filtered: Callback = Arc::new(move |event: &ChangeEvent| {
            if event.prop == key {
                callback(event);
            }
        });
        attach(
            self,
            parent.state().clone(),
            parent.target(),
            filtered,
            WatchOptions::default(),
        )
    }
}

impl Reactive {
    /// Watch this proxy. Unlike [`Store::watch`] this cannot fail.
    pub fn watch<F>(&self, callback: F, options: WatchOptions) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        attach(
            self.store(),
            self.state().clone(),
            self.target(),
            Arc::new(callback),
            options,
        )
    }

    /// Watch one key at the end of a dot-separated path below this proxy.
    pub fn watch_path<F>(&self, path: &str, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.store().watch_path(self, path, callback)
    }
}

fn attach(
    store: &Store,
    state: Arc<TargetState>,
    target: &Target,
    callback: Callback,
    options: WatchOptions,
) -> Subscription {
    let nested: Nested = Arc::new(Mutex::new(HashMap::new()));
    let weak_target = target.downgrade();

    let set_id = {
        let callback = callback.clone();
        let nested = nested.clone();
        let store = store.downgrade();
        let weak_target = weak_target.clone();
        state.registry.on_set(move |key, new_value, old_value| {
            let Some(target) = weak_target.upgrade() else {
                return;
            };
            if options.deep {
                follow(&store, &nested, key, new_value, &callback, options);
            }
            callback(&ChangeEvent {
                prop: key.to_owned(),
                new_value: Some(new_value.clone()),
                old_value: old_value.cloned(),
                target,
                deleted: false,
            });
        })
    };

    let delete_id = {
        let callback = callback.clone();
        let nested = nested.clone();
        state.registry.on_delete(move |key, old_value| {
            let Some(target) = weak_target.upgrade() else {
                return;
            };
            let dropped = nested.lock().remove(key);
            if let Some(dropped) = dropped {
                dropped.unsubscribe();
            }
            callback(&ChangeEvent {
                prop: key.to_owned(),
                new_value: None,
                old_value: Some(old_value.clone()),
                target,
                deleted: true,
            });
        })
    };

    trace!(target_id = %target.id(), deep = options.deep, "watcher attached");

    Subscription::new(move || {
        state.registry.remove(set_id);
        state.registry.remove(delete_id);
        let children: Vec<Subscription> = nested.lock().drain().map(|(_, sub)| sub).collect();
        for child in children {
            child.unsubscribe();
        }
        trace!(target_id = %state.registry.target(), "watcher detached");
    })
}

/// Attach a deep watcher to a freshly assigned container, replacing whatever
/// was attached under the same key.
fn follow(
    store: &WeakStore,
    nested: &Nested,
    key: &str,
    new_value: &Value,
    callback: &Callback,
    options: WatchOptions,
) {
    let child = match (new_value, store.upgrade()) {
        (Value::Object(container), Some(store)) => {
            let proxy = store.wrap(container);
            Some(attach(
                &store,
                proxy.state().clone(),
                container,
                callback.clone(),
                options,
            ))
        }
        _ => None,
    };

    let replaced = {
        let mut nested = nested.lock();
        match child {
            Some(child) => nested.insert(key.to_owned(), child),
            None => nested.remove(key),
        }
    };
    if let Some(replaced) = replaced {
        replaced.unsubscribe();
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: &Option<Value>| {
            value
                .as_ref()
                .map_or_else(|| "<none>".to_string(), |v| format!("{v:?}"))
        };
        if self.deleted {
            write!(f, "{} deleted (was {})", self.prop, show(&self.old_value))
        } else {
            write!(
                f,
                "{}: {} -> {}",
                self.prop,
                show(&self.old_value),
                show(&self.new_value)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<ChangeEvent>>>, impl Fn(&ChangeEvent) + Send + Sync + 'static) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        (events, move |event: &ChangeEvent| events_clone.lock().push(event.clone()))
    }

    fn wrap(store: &Store, json: serde_json::Value) -> Reactive {
        store.wrap(&Target::from_json(json).unwrap())
    }

    #[test]
    fn watching_an_unwrapped_target_fails() {
        let store = Store::new();
        let target = Target::record();
        let result = store.watch(&target, |_| {}, WatchOptions::default());
        assert!(matches!(result, Err(ReactiveError::NotReactive(id)) if id == target.id()));
    }

    #[test]
    fn events_compare_targets_by_identity() {
        let store = Store::new();
        let model = wrap(&store, json!({"x": 3}));
        let (events, record) = recorder();
        let _sub = model.watch(record, WatchOptions::default());

        model.set("x", 5).unwrap();

        assert_eq!(
            *events.lock(),
            vec![ChangeEvent {
                prop: "x".into(),
                new_value: Some(Value::from(5)),
                old_value: Some(Value::from(3)),
                target: model.to_raw(),
                deleted: false,
            }]
        );

        let mut elsewhere = events.lock()[0].clone();
        elsewhere.target = Target::from_pairs([("x", 5)]);
        assert_ne!(events.lock()[0], elsewhere);
    }

    #[test]
    fn watch_reports_one_event_per_write() {
        let store = Store::new();
        let model = wrap(&store, json!({"x": 3}));
        let (events, record) = recorder();
        let _sub = store
            .watch(model.target(), record, WatchOptions::default())
            .unwrap();

        model.set("x", 5).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].prop, "x");
        assert_eq!(events[0].new_value, Some(Value::from(5)));
        assert_eq!(events[0].old_value, Some(Value::from(3)));
        assert!(Target::ptr_eq(&events[0].target, model.target()));
        assert!(!events[0].deleted);
    }

    #[test]
    fn delete_events_are_flagged() {
        let store = Store::new();
        let model = wrap(&store, json!({"x": 1}));
        let (events, record) = recorder();
        let _sub = model.watch(record, WatchOptions::default());

        model.delete("x").unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(events[0].deleted);
        assert_eq!(events[0].new_value, None);
        assert_eq!(events[0].old_value, Some(Value::from(1)));
    }

    #[test]
    fn unsubscribe_twice_is_safe_and_silences_the_watcher() {
        let store = Store::new();
        let model = wrap(&store, json!({"x": 1}));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let sub = model.watch(
            move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
            WatchOptions::default(),
        );

        sub.unsubscribe();
        sub.unsubscribe();
        model.set("x", 2).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.listener_counts(model.target()), Some((0, 0, 0)));
    }

    #[test]
    fn deep_watch_follows_assigned_containers() {
        let store = Store::new();
        let model = wrap(&store, json!({"settings": null}));
        let (events, record) = recorder();
        let sub = model.watch(record, WatchOptions::deep());

        let settings = Target::from_pairs([("theme", "light")]);
        model.set("settings", &settings).unwrap();
        model.child("settings").unwrap().set("theme", "dark").unwrap();

        {
            let events = events.lock();
            assert_eq!(events.len(), 2);
            assert_eq!(events[1].prop, "theme");
            assert!(Target::ptr_eq(&events[1].target, &settings));
        }

        sub.unsubscribe();
        store.wrap(&settings).set("theme", "light").unwrap();
        assert_eq!(events.lock().len(), 2);
        assert_eq!(store.listener_counts(&settings), Some((0, 0, 0)));
    }

    #[test]
    fn deep_watch_ignores_containers_present_before_watching() {
        let store = Store::new();
        let model = wrap(&store, json!({"settings": {"theme": "light"}}));
        let settings = model.child("settings").unwrap();
        let (events, record) = recorder();
        let _sub = model.watch(record, WatchOptions::deep());

        settings.set("theme", "dark").unwrap();
        assert!(events.lock().is_empty());
    }

    #[test]
    fn reassigning_a_property_detaches_the_previous_nested_watcher() {
        let store = Store::new();
        let model = wrap(&store, json!({}));
        let (events, record) = recorder();
        let _sub = model.watch(record, WatchOptions::deep());

        let first = Target::record();
        let second = Target::record();
        model.set("slot", &first).unwrap();
        model.set("slot", &second).unwrap();

        store.wrap(&first).set("x", 1).unwrap();
        assert_eq!(events.lock().len(), 2);
        store.wrap(&second).set("x", 1).unwrap();
        assert_eq!(events.lock().len(), 3);
    }

    #[test]
    fn watch_path_filters_on_the_last_segment() {
        let store = Store::new();
        let model = wrap(&store, json!({"a": {"b": {"c": 1, "d": 1}}}));
        let (events, record) = recorder();
        let _sub = store.watch_path(&model, "a.b.c", record);

        model.set_path("a.b.d", 2).unwrap();
        model.set_path("a.b.c", 2).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].new_value, Some(Value::from(2)));
    }

    #[test]
    fn watch_path_on_a_missing_parent_is_inert() {
        let store = Store::new();
        let model = wrap(&store, json!({"a": 5}));
        let sub = model.watch_path("a.b.c", |_| panic!("should never fire"));
        assert!(!sub.is_active());
        sub.unsubscribe();

        let sub = model.watch_path("missing.b", |_| panic!("should never fire"));
        assert!(!sub.is_active());
    }

    #[test]
    fn self_correcting_watcher_reaches_a_fixed_point() {
        let store = Store::new();
        let model = wrap(&store, json!({"x": 0}));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let writer = model.clone();
        let _sub = model.watch(
            move |event| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                // Clamp to 10; the second write is a no-op and stops the loop.
                if event.new_value.as_ref().and_then(Value::as_f64) > Some(10.0) {
                    writer.set("x", 10).unwrap();
                }
            },
            WatchOptions::default(),
        );

        model.set("x", 50).unwrap();
        assert_eq!(model.get("x"), Some(Value::from(10)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn change_event_display() {
        let event = ChangeEvent {
            prop: "x".into(),
            new_value: None,
            old_value: Some(Value::from(1)),
            target: Target::record(),
            deleted: true,
        };
        assert_eq!(event.to_string(), "x deleted (was Number(1.0))");
    }
}
