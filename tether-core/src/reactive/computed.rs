//! Computed Engine
//!
//! A computed key is a cached derived value exposed as an ordinary,
//! read-only key of a reactive object.
//!
//! # How Computed Keys Work
//!
//! 1. On declaration the getter runs once, eagerly, inside a tracking frame.
//!    Every proxy read performed during that run is recorded.
//!
//! 2. The recorded `(target, key)` pairs become the dependency set. The slot
//!    listens to `set`/`delete` on each target that appears in it.
//!
//! 3. A write to a key outside the set is ignored. A write to a key inside it
//!    re-runs the getter, replacing both the cached value and the dependency
//!    set, since conditional reads can change what the getter touches.
//!
//! 4. If the new value differs (`Object.is`), the owner's `set` listeners fire
//!    for the computed key, so watchers and other computed keys downstream
//!    see the change like any other write.
//!
//! Reading a computed key never runs the getter.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::context::{Dependency, ReactiveContext};
use super::store::{Reactive, ReactiveOptions, Store, TargetState, WeakStore};
use super::subscriber::ListenerId;
use crate::value::{TargetId, Value, WeakTarget};

/// A computed getter. It receives the owning proxy and should read through it.
pub type Getter = Arc<dyn Fn(&Reactive) -> Value + Send + Sync>;

/// The set of keys to declare with [`Store::computed`].
#[derive(Clone, Default)]
pub struct ComputedDescriptors {
    entries: Vec<(String, Getter)>,
}

impl ComputedDescriptors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a computed key.
    pub fn define<F, V>(mut self, key: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Reactive) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.entries
            .push((key.into(), Arc::new(move |proxy: &Reactive| getter(proxy).into())));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ComputedDescriptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(key, _)| key))
            .finish()
    }
}

/// Cache and dependency bookkeeping for one computed key.
pub(crate) struct ComputedSlot {
    /// Identity of this slot's tracking frames.
    id: ListenerId,
    key: String,
    getter: Getter,

    /// The owner is held weakly and re-wrapped on refresh, so the slot keeps
    /// working after every proxy handle of the owner has been dropped.
    owner: WeakTarget,
    store: WeakStore,
    deep: bool,

    value: RwLock<Value>,
    dependencies: RwLock<IndexSet<Dependency>>,
    watches: Mutex<Vec<(Weak<TargetState>, ListenerId)>>,
    evaluating: AtomicBool,
    evaluations: AtomicUsize,
    released: AtomicBool,
}

impl ComputedSlot {
    fn new(key: String, owner: &Reactive, getter: Getter) -> Self {
        Self {
            id: ListenerId::new(),
            key,
            getter,
            owner: owner.target().downgrade(),
            store: owner.store().downgrade(),
            deep: owner.is_deep(),
            value: RwLock::new(Value::Null),
            dependencies: RwLock::new(IndexSet::new()),
            watches: Mutex::new(Vec::new()),
            evaluating: AtomicBool::new(false),
            evaluations: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        }
    }

    /// The cached value.
    pub(crate) fn value(&self) -> Value {
        self.value.read().clone()
    }

    pub(crate) fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Acquire)
    }

    pub(crate) fn dependencies(&self) -> Vec<Dependency> {
        self.dependencies.read().iter().cloned().collect()
    }

    /// Run the getter under a tracking frame and store the result.
    ///
    /// Returns `(old, new)`, or `None` if the slot is already evaluating
    /// further up the stack.
    fn evaluate(&self, owner: &Reactive) -> Option<(Value, Value)> {
        if self.evaluating.swap(true, Ordering::AcqRel) {
            warn!(key = %self.key, "computed key depends on itself; skipping nested evaluation");
            return None;
        }

        let (value, reads) = {
            let _ctx = ReactiveContext::enter(self.id);
            let value = (self.getter)(owner);
            (value, ReactiveContext::get_dependencies())
        };
        self.evaluating.store(false, Ordering::Release);

        *self.dependencies.write() = reads.into_iter().collect();
        self.evaluations.fetch_add(1, Ordering::AcqRel);
        let old = std::mem::replace(&mut *self.value.write(), value.clone());
        Some((old, value))
    }

    /// Listen to every target that appears in the current dependency set,
    /// replacing the previous listeners.
    fn track(self: &Arc<Self>, store: &Store) {
        let targets: IndexSet<TargetId> = self
            .dependencies
            .read()
            .iter()
            .map(|dependency| dependency.target)
            .collect();

        let mut watches = Vec::with_capacity(targets.len() * 2);
        for target in targets {
            // Reads on targets that are not reactive in this store cannot be
            // observed.
            let Some(state) = store.state(target) else {
                continue;
            };

            let slot = Arc::downgrade(self);
            let on_set = state.registry.on_set(move |key, _, old| {
                ComputedSlot::dependency_changed(&slot, target, key, old.is_none());
            });
            let slot = Arc::downgrade(self);
            let on_delete = state.registry.on_delete(move |key, _| {
                ComputedSlot::dependency_changed(&slot, target, key, true);
            });

            watches.push((Arc::downgrade(&state), on_set));
            watches.push((Arc::downgrade(&state), on_delete));
        }

        let previous = std::mem::replace(&mut *self.watches.lock(), watches);
        remove_watches(previous);
    }

    fn dependency_changed(slot: &Weak<ComputedSlot>, target: TargetId, key: &str, reshaped: bool) {
        let Some(slot) = slot.upgrade() else {
            return;
        };
        if slot.released.load(Ordering::Acquire) {
            return;
        }
        let tracked = slot
            .dependencies
            .read()
            .iter()
            .any(|dependency| dependency.is_affected_by(target, key, reshaped));
        if tracked {
            slot.refresh();
        }
    }

    /// Re-evaluate after a dependency changed and notify downstream.
    fn refresh(self: &Arc<Self>) {
        let (Some(store), Some(target)) = (self.store.upgrade(), self.owner.upgrade()) else {
            return;
        };
        let owner = store.reactive_with(&target, ReactiveOptions { deep: self.deep });

        let Some((old, new)) = self.evaluate(&owner) else {
            return;
        };
        self.track(&store);
        debug!(
            target_id = %owner.id(),
            key = %self.key,
            evaluations = self.evaluations(),
            "recomputed"
        );

        if !old.same(&new) {
            owner.state().registry.emit_set(&self.key, &new, Some(&old));
        }
    }

    /// Stop tracking. The cached value stays readable but is frozen.
    pub(crate) fn release(&self) {
        self.released.store(true, Ordering::Release);
        let watches = std::mem::take(&mut *self.watches.lock());
        remove_watches(watches);
    }
}

fn remove_watches(watches: Vec<(Weak<TargetState>, ListenerId)>) {
    for (state, id) in watches {
        if let Some(state) = state.upgrade() {
            state.registry.remove(id);
        }
    }
}

impl fmt::Debug for ComputedSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedSlot")
            .field("key", &self.key)
            .field("value", &self.value())
            .field("dependencies", &self.dependencies.read().len())
            .field("evaluations", &self.evaluations())
            .finish()
    }
}

impl Store {
    /// Declare computed keys on a reactive object.
    ///
    /// Each getter runs once now; afterwards only writes to what it read
    /// re-run it. Declaring a key that is already computed replaces it.
    /// Returns the same proxy.
    pub fn computed(&self, proxy: &Reactive, descriptors: ComputedDescriptors) -> Reactive {
        for (key, getter) in descriptors.entries {
            let slot = Arc::new(ComputedSlot::new(key.clone(), proxy, getter));
            slot.evaluate(proxy);
            slot.track(self);

            let previous = proxy
                .state()
                .computed
                .write()
                .insert(key.clone(), slot.clone());
            if let Some(previous) = previous {
                previous.release();
            }

            debug!(
                target_id = %proxy.id(),
                key = %key,
                dependencies = slot.dependencies.read().len(),
                "declared computed key"
            );
        }
        proxy.clone()
    }
}

impl Reactive {
    /// Declare computed keys on this proxy. See [`Store::computed`].
    pub fn computed(&self, descriptors: ComputedDescriptors) -> Reactive {
        self.store().computed(self, descriptors)
    }

    pub fn is_computed(&self, key: &str) -> bool {
        self.state().is_computed(key)
    }

    /// How many times the getter behind `key` has run.
    pub fn evaluation_count(&self, key: &str) -> Option<usize> {
        self.state().computed_slot(key).map(|slot| slot.evaluations())
    }

    /// The dependency set recorded by the last evaluation of `key`.
    pub fn dependencies_of(&self, key: &str) -> Option<Vec<Dependency>> {
        self.state().computed_slot(key).map(|slot| slot.dependencies())
    }
}
