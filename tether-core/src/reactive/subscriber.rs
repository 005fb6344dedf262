//! Listener identities and teardown handles.
//!
//! Every listener placed in a handler registry gets a [`ListenerId`] so it can
//! be removed again. Higher-level APIs (`watch`, `computed`, bindings, `Ref`)
//! hand that removal back to the caller as a [`Subscription`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Unique identifier for a registered listener or tracking frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle that removes a listener when [`unsubscribe`](Self::unsubscribe) is
/// called.
///
/// Dropping the handle does *not* unsubscribe: a listener lives as long as the
/// target it observes unless it is explicitly torn down. Clones share the same
/// teardown, and only the first call to `unsubscribe` runs it.
#[derive(Clone)]
#[must_use = "dropping a Subscription leaves the listener registered; call unsubscribe() to remove it"]
pub struct Subscription {
    teardown: Arc<Mutex<Option<Teardown>>>,
}

impl Subscription {
    pub(crate) fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Arc::new(Mutex::new(Some(Box::new(teardown)))),
        }
    }

    /// A subscription with nothing to tear down.
    ///
    /// Returned when a path does not resolve yet.
    pub fn noop() -> Self {
        Self {
            teardown: Arc::new(Mutex::new(None)),
        }
    }

    /// Combine several subscriptions into one that tears them all down.
    pub fn merge(parts: Vec<Subscription>) -> Self {
        Self::new(move || {
            for part in parts {
                part.unsubscribe();
            }
        })
    }

    /// Remove the listener. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        // Take the teardown first so the lock is released before it runs.
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Whether `unsubscribe` still has something to do.
    pub fn is_active(&self) -> bool {
        self.teardown.lock().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
