//! Reactive Store
//!
//! The store is the reactivity context: it owns the identity cache (one proxy
//! per target) and the handler registries (listeners per target). Callers
//! create one store and pass it around instead of relying on process-wide
//! registries.
//!
//! # How It Works
//!
//! 1. [`Store::wrap`] looks the target up in the identity cache. A live proxy
//!    is returned as is; otherwise a new proxy is created and the target's
//!    registry is allocated on first wrap.
//!
//! 2. Reads through a [`Reactive`] record the `(target, key)` pair in the
//!    tracking context and fire `get` listeners. In deep mode, containers read
//!    through the proxy come back wrapped by the same store.
//!
//! 3. Writes compare old and new with `Object.is` semantics. Equal values are
//!    a no-op; anything else is stored and then every `set` listener runs
//!    synchronously, before `set` returns.
//!
//! # Lifetimes
//!
//! Both maps hold the target weakly. A registry lives as long as its target
//! does; entries for dropped targets are swept as the map grows. Hosts that
//! want deterministic release can call [`Store::dispose`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::computed::ComputedSlot;
use super::context::{Dependency, ReactiveContext};
use super::registry::HandlerRegistry;
use crate::config::StoreConfig;
use crate::error::{ReactiveError, Result};
use crate::immutable::{self, split_path};
use crate::value::{Target, TargetId, Value, WeakTarget};

/// Registry count below which no sweep is attempted.
const MIN_SWEEP_THRESHOLD: usize = 64;

/// Options for [`Store::reactive_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactiveOptions {
    /// Wrap nested containers when they are read through the proxy.
    pub deep: bool,
}

impl Default for ReactiveOptions {
    fn default() -> Self {
        Self { deep: true }
    }
}

/// Per-target bookkeeping shared by every proxy of the target.
pub(crate) struct TargetState {
    pub(crate) registry: HandlerRegistry,
    pub(crate) computed: RwLock<IndexMap<String, Arc<ComputedSlot>>>,
}

impl TargetState {
    fn new(target: TargetId) -> Self {
        Self {
            registry: HandlerRegistry::new(target),
            computed: RwLock::new(IndexMap::new()),
        }
    }

    pub(crate) fn computed_slot(&self, key: &str) -> Option<Arc<ComputedSlot>> {
        self.computed.read().get(key).cloned()
    }

    pub(crate) fn is_computed(&self, key: &str) -> bool {
        self.computed.read().contains_key(key)
    }

    /// Stop every computed key from tracking its dependencies.
    fn release_computed(&self) {
        let slots: Vec<_> = self.computed.write().drain(..).map(|(_, slot)| slot).collect();
        for slot in slots {
            slot.release();
        }
    }
}

struct Entry {
    target: WeakTarget,
    state: Arc<TargetState>,
}

struct StoreInner {
    config: StoreConfig,
    /// Identity cache: target → its canonical proxy.
    proxies: DashMap<TargetId, Weak<ProxyInner>>,
    /// Handler registries and computed tables, keyed by target.
    states: DashMap<TargetId, Entry>,
    sweep_at: AtomicUsize,
}

/// The reactivity context.
///
/// Cloning a store shares it.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning handle to a store, held by listeners the store itself keeps.
#[derive(Clone)]
pub(crate) struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<Store> {
        self.0.upgrade().map(|inner| Store { inner })
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                proxies: DashMap::new(),
                states: DashMap::new(),
                sweep_at: AtomicUsize::new(MIN_SWEEP_THRESHOLD),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Wrap a value. Primitives come back unchanged; containers come back as
    /// their canonical proxy.
    pub fn reactive(&self, value: impl Into<Value>) -> Wrapped {
        match value.into() {
            Value::Object(target) => Wrapped::Proxy(self.wrap(&target)),
            other => Wrapped::Plain(other),
        }
    }

    /// Wrap a container using the store's default options.
    pub fn wrap(&self, target: &Target) -> Reactive {
        self.reactive_with(
            target,
            ReactiveOptions {
                deep: self.inner.config.deep,
            },
        )
    }

    /// Wrap a container.
    ///
    /// If the target already has a live proxy, that proxy is returned and
    /// `options` is ignored.
    pub fn reactive_with(&self, target: &Target, options: ReactiveOptions) -> Reactive {
        let id = target.id();
        if let Some(inner) = self.cached_proxy(id) {
            return Reactive { inner };
        }

        let state = self.state_for(target);
        let inner = Arc::new(ProxyInner {
            target: target.clone(),
            state,
            store: self.clone(),
            deep: options.deep,
        });
        self.inner.proxies.insert(id, Arc::downgrade(&inner));
        trace!(target_id = %id, deep = options.deep, "created proxy");

        Reactive { inner }
    }

    /// Whether the target has a handler registry in this store.
    pub fn is_reactive(&self, target: &Target) -> bool {
        self.inner.states.contains_key(&target.id())
    }

    /// The plain target behind a proxy.
    pub fn to_raw(&self, proxy: &Reactive) -> Target {
        proxy.to_raw()
    }

    /// Number of `(get, set, delete)` listeners registered for a target.
    pub fn listener_counts(&self, target: &Target) -> Option<(usize, usize, usize)> {
        self.state(target.id())
            .map(|state| state.registry.listener_counts())
    }

    /// Number of targets with a live registry.
    pub fn tracked_targets(&self) -> usize {
        self.inner.states.len()
    }

    /// Release the registry and identity-cache entry of a target.
    ///
    /// Computed keys stop tracking. Proxies that are still held keep working
    /// against the released registry, but the next `wrap` of the target
    /// creates a fresh proxy. Returns `false` if the target was not reactive.
    pub fn dispose(&self, target: &Target) -> bool {
        let id = target.id();
        self.inner.proxies.remove(&id);
        match self.inner.states.remove(&id) {
            Some((_, entry)) => {
                entry.state.release_computed();
                debug!(target_id = %id, "disposed target");
                true
            }
            None => false,
        }
    }

    pub(crate) fn state(&self, id: TargetId) -> Option<Arc<TargetState>> {
        self.inner.states.get(&id).map(|entry| entry.state.clone())
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }

    fn cached_proxy(&self, id: TargetId) -> Option<Arc<ProxyInner>> {
        self.inner.proxies.get(&id).and_then(|proxy| proxy.upgrade())
    }

    fn state_for(&self, target: &Target) -> Arc<TargetState> {
        let id = target.id();
        if let Some(state) = self.state(id) {
            return state;
        }

        self.maybe_sweep();
        let state = Arc::new(TargetState::new(id));
        self.inner.states.insert(
            id,
            Entry {
                target: target.downgrade(),
                state: state.clone(),
            },
        );
        debug!(target_id = %id, "allocated handler registry");
        state
    }

    /// Drop registries whose targets are gone, once the map has doubled.
    fn maybe_sweep(&self) {
        let before = self.inner.states.len();
        if before < self.inner.sweep_at.load(Ordering::Relaxed) {
            return;
        }

        self.inner.states.retain(|_, entry| entry.target.is_alive());
        self.inner.proxies.retain(|_, proxy| proxy.strong_count() > 0);

        let after = self.inner.states.len();
        self.inner
            .sweep_at
            .store((after * 2).max(MIN_SWEEP_THRESHOLD), Ordering::Relaxed);
        debug!(before, after, "swept handler registries");
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("tracked_targets", &self.tracked_targets())
            .field("deep", &self.inner.config.deep)
            .finish()
    }
}

struct ProxyInner {
    target: Target,
    state: Arc<TargetState>,
    store: Store,
    deep: bool,
}

/// The reactive proxy of one target.
///
/// Equality is identity: two `Reactive` values are equal only if they are the
/// same proxy, which the store guarantees for the same target.
#[derive(Clone)]
pub struct Reactive {
    inner: Arc<ProxyInner>,
}

/// Non-owning handle to a proxy.
#[derive(Clone)]
pub(crate) struct WeakReactive(Weak<ProxyInner>);

impl WeakReactive {
    pub(crate) fn upgrade(&self) -> Option<Reactive> {
        self.0.upgrade().map(|inner| Reactive { inner })
    }
}

impl Reactive {
    pub fn id(&self) -> TargetId {
        self.inner.target.id()
    }

    /// The wrapped target.
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    /// Escape hatch back to the plain target.
    pub fn to_raw(&self) -> Target {
        self.inner.target.clone()
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn is_deep(&self) -> bool {
        self.inner.deep
    }

    pub fn ptr_eq(a: &Reactive, b: &Reactive) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn state(&self) -> &Arc<TargetState> {
        &self.inner.state
    }

    pub(crate) fn downgrade(&self) -> WeakReactive {
        WeakReactive(Arc::downgrade(&self.inner))
    }

    /// Read a property.
    ///
    /// Computed keys return their cached value. Nested containers come back
    /// raw; use [`read`](Self::read) or [`child`](Self::child) for the
    /// wrapped form.
    pub fn get(&self, key: &str) -> Option<Value> {
        ReactiveContext::track_dependency(Dependency::new(self.id(), key));
        self.inner.state.registry.emit_get(key);

        if let Some(slot) = self.inner.state.computed_slot(key) {
            return Some(slot.value());
        }
        self.inner.target.get(key)
    }

    /// Read a property the way a proxy trap would: in deep mode containers
    /// are returned as their proxy.
    pub fn read(&self, key: &str) -> Option<Wrapped> {
        let value = self.get(key)?;
        Some(match value {
            Value::Object(target) if self.inner.deep => {
                Wrapped::Proxy(self.inner.store.reactive_with(&target, self.options()))
            }
            other => Wrapped::Plain(other),
        })
    }

    /// The wrapped nested container under `key`.
    ///
    /// `None` if the key is missing, holds a primitive, or the proxy is
    /// shallow.
    pub fn child(&self, key: &str) -> Option<Reactive> {
        self.read(key)?.into_proxy()
    }

    /// Read a dot-separated path. The empty path is the target itself.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let segments = split_path(path);
        let Some((last, parents)) = segments.split_last() else {
            return Some(Value::Object(self.to_raw()));
        };
        self.resolve(parents)?.get(last)
    }

    /// Write through the proxy. Returns whether the value changed.
    ///
    /// Passing a [`Reactive`] stores its raw target.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        if self.inner.state.is_computed(key) {
            return Err(ReactiveError::ReadOnly {
                key: key.to_owned(),
            });
        }

        let old = self.inner.target.get(key);
        if old.as_ref().is_some_and(|old| old.same(&value)) {
            return Ok(false);
        }

        self.inner.target.insert(key, value.clone())?;
        trace!(target_id = %self.id(), key, kind = value.type_name(), "set");
        self.inner.state.registry.emit_set(key, &value, old.as_ref());
        Ok(true)
    }

    /// Write a dot-separated path through the proxies along it.
    ///
    /// Returns `Ok(false)` without writing if an intermediate segment does not
    /// resolve to a container.
    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> Result<bool> {
        let segments = split_path(path);
        let Some((last, parents)) = segments.split_last() else {
            return Err(ReactiveError::InvalidPath {
                path: path.to_owned(),
                reason: "path is empty",
            });
        };
        match self.resolve(parents) {
            Some(parent) => parent.set(last, value),
            None => {
                debug!(target_id = %self.id(), path, "set_path skipped: parent does not resolve");
                Ok(false)
            }
        }
    }

    /// Remove a property. Listeners fire only if something was removed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        if self.inner.state.is_computed(key) {
            return Err(ReactiveError::ReadOnly {
                key: key.to_owned(),
            });
        }

        match self.inner.target.remove(key)? {
            Some(old) => {
                trace!(target_id = %self.id(), key, "delete");
                self.inner.state.registry.emit_delete(key, &old);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stored keys followed by computed keys.
    ///
    /// Inside a computed getter this is tracked as a read of the key set.
    pub fn keys(&self) -> Vec<String> {
        ReactiveContext::track_dependency(Dependency::keys(self.id()));
        let mut keys = self.inner.target.keys();
        for key in self.inner.state.computed.read().keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        ReactiveContext::track_dependency(Dependency::new(self.id(), key));
        self.inner.state.is_computed(key) || self.inner.target.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deep plain copy of the stored data. Computed keys are not included.
    pub fn snapshot(&self) -> Target {
        immutable::clone_target(&self.inner.target)
    }

    fn options(&self) -> ReactiveOptions {
        ReactiveOptions {
            deep: self.inner.deep,
        }
    }

    /// Walk `segments` from this proxy, wrapping each container on the way.
    ///
    /// Path walks always wrap, even from a shallow proxy, because whoever
    /// asked needs the registry at the end of the walk.
    pub(crate) fn resolve(&self, segments: &[&str]) -> Option<Reactive> {
        let mut current = self.clone();
        for segment in segments {
            current = match current.get(segment)? {
                Value::Object(target) => {
                    current.inner.store.reactive_with(&target, current.options())
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        Reactive::ptr_eq(self, other)
    }
}

impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.inner.target)
            .field("deep", &self.inner.deep)
            .field("registry", &self.inner.state.registry)
            .finish()
    }
}

impl From<Reactive> for Value {
    fn from(proxy: Reactive) -> Self {
        Value::Object(proxy.to_raw())
    }
}

impl From<&Reactive> for Value {
    fn from(proxy: &Reactive) -> Self {
        Value::Object(proxy.to_raw())
    }
}

/// Result of wrapping a value: primitives pass through, containers become
/// proxies.
#[derive(Debug, Clone, PartialEq)]
pub enum Wrapped {
    Plain(Value),
    Proxy(Reactive),
}

impl Wrapped {
    pub fn into_proxy(self) -> Option<Reactive> {
        match self {
            Wrapped::Proxy(proxy) => Some(proxy),
            Wrapped::Plain(_) => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Reactive> {
        match self {
            Wrapped::Proxy(proxy) => Some(proxy),
            Wrapped::Plain(_) => None,
        }
    }

    /// Back to a plain value; proxies unwrap to their raw target.
    pub fn into_value(self) -> Value {
        match self {
            Wrapped::Proxy(proxy) => proxy.into(),
            Wrapped::Plain(value) => value,
        }
    }
}
