//! Tracking Context
//!
//! The tracking context records which properties a computed getter reads.
//! When a proxy property is read, the proxy appends `(target, key)` to the
//! innermost frame; the computed engine turns that list into the dependency
//! set that decides when to re-evaluate.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Entering a computed evaluation
//! pushes a frame, and the returned guard pops it when dropped, so the stack
//! stays balanced even if the getter panics.
//!
//! Frames nest: a getter that reads another computed key records that key in
//! its own frame, while the inner evaluation (if any) collects into its own.

use std::cell::RefCell;

use super::subscriber::ListenerId;
use crate::value::TargetId;

/// One property read, as recorded during an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub target: TargetId,
    pub key: String,
    /// The read enumerated the key set (`keys`, `len`) instead of reading
    /// one key. Such a dependency changes when a key is added or removed.
    pub structural: bool,
}

impl Dependency {
    pub fn new(target: TargetId, key: impl Into<String>) -> Self {
        Self {
            target,
            key: key.into(),
            structural: false,
        }
    }

    /// A read of the target's key set.
    pub fn keys(target: TargetId) -> Self {
        Self {
            target,
            key: String::new(),
            structural: true,
        }
    }

    /// Whether a write to `key` on `target` invalidates this read.
    /// `reshaped` is true when the write added or removed the key.
    pub fn is_affected_by(&self, target: TargetId, key: &str, reshaped: bool) -> bool {
        self.target == target && if self.structural { reshaped } else { self.key == key }
    }
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the tracking stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The evaluation that owns this frame.
    owner: ListenerId,
    /// Reads collected so far, in order, possibly with repeats.
    dependencies: Vec<Dependency>,
}

/// Guard that pops the frame when dropped.
pub struct ReactiveContext {
    owner: ListenerId,
}

impl ReactiveContext {
    /// Enter a new tracking frame for the given evaluation.
    pub fn enter(owner: ListenerId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                owner,
                dependencies: Vec::new(),
            });
        });

        Self { owner }
    }

    /// Check if a frame is active on this thread.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The owner of the innermost frame, if any.
    pub fn current_owner() -> Option<ListenerId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.owner))
    }

    /// Record a read in the innermost frame. No-op outside an evaluation.
    pub fn track_dependency(dependency: Dependency) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                entry.dependencies.push(dependency);
            }
        });
    }

    /// Reads collected in the innermost frame.
    pub fn get_dependencies() -> Vec<Dependency> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.owner, self.owner,
                    "tracking frame mismatch: expected {:?}, got {:?}",
                    self.owner, entry.owner
                );
            }
        });
    }
}
