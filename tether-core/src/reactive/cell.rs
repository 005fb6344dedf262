//! Ref Implementation
//!
//! A [`Ref`] is a single reactive value, for state that does not need a whole
//! reactive object: a counter, a flag, the id of the selected row.
//!
//! # How Refs Work
//!
//! 1. `set` compares the new value with the current one and does nothing if
//!    they are equal.
//!
//! 2. Otherwise the value is replaced and every watcher is called with
//!    `(new, old)` before `set` returns.
//!
//! Refs are independent of [`Store`](super::Store): they have no identity
//! cache and no path addressing.
//!
//! # Thread Safety
//!
//! The value sits behind a `RwLock`. No lock is held while watchers run, so a
//! watcher may read or write the ref it observes.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::subscriber::{ListenerId, Subscription};

/// Counter for generating unique ref IDs.
static REF_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_ref_id() -> u64 {
    REF_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Watcher<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

/// A reactive cell holding one value of type `T`.
///
/// # Example
///
/// ```rust
/// use tether_core::reactive::Ref;
///
/// let count = Ref::new(0);
/// let sub = count.watch(|new, old| println!("{old} -> {new}"));
///
/// count.set(5); // prints "0 -> 5"
/// count.set(5); // unchanged, prints nothing
/// sub.unsubscribe();
/// ```
pub struct Ref<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Unique identifier for this ref.
    id: u64,

    value: Arc<RwLock<T>>,

    watchers: Arc<RwLock<Vec<(ListenerId, Watcher<T>)>>>,
}

impl<T> Ref<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            id: next_ref_id(),
            value: Arc::new(RwLock::new(value)),
            watchers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get the ref's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Run `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Replace the value and notify watchers.
    ///
    /// Returns `false` (and notifies no one) if the value is unchanged.
    pub fn set(&self, value: T) -> bool {
        let old = {
            let mut guard = self.value.write();
            if *guard == value {
                return false;
            }
            std::mem::replace(&mut *guard, value.clone())
        };

        self.notify(&value, &old);
        true
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.value.read());
        self.set(new_value)
    }

    /// Call `watcher(new, old)` after every change.
    pub fn watch<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.watchers.write().push((id, Arc::new(watcher)));

        let watchers = Arc::clone(&self.watchers);
        Subscription::new(move || {
            watchers.write().retain(|(watcher_id, _)| *watcher_id != id);
        })
    }

    /// Get the number of watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers.read().len()
    }

    fn notify(&self, new: &T, old: &T) {
        let watchers: Vec<Watcher<T>> = self
            .watchers
            .read()
            .iter()
            .map(|(_, watcher)| watcher.clone())
            .collect();
        for watcher in watchers {
            watcher(new, old);
        }
    }
}

impl<T> Clone for Ref<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            watchers: Arc::clone(&self.watchers),
        }
    }
}

impl<T> Default for Ref<T>
where
    T: Clone + PartialEq + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for Ref<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id)
            .field("value", &*self.value.read())
            .field("watcher_count", &self.watcher_count())
            .finish()
    }
}
