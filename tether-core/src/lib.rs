//! Tether Core
//!
//! This crate provides the state layer of the Tether UI toolkit.
//! It implements:
//!
//! - Reactive proxies over plain records and sequences
//! - Watchers, computed keys and single-value refs
//! - Two-way bindings between model paths and UI elements
//! - Diffing and copy-on-write updates over plain snapshots
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: The plain data model (`Value`, `Target`) and its JSON interop
//! - `reactive`: The `Store`, proxies, watchers, computed keys and `Ref`
//! - `bind`: The element seam and the binding engine
//! - `immutable`: Pure diff, clone, freeze and path utilities, plus `History`
//! - `config`: Store configuration
//!
//! # Example
//!
//! ```rust
//! use tether_core::reactive::{ComputedDescriptors, Store, WatchOptions};
//! use tether_core::value::{Target, Value};
//!
//! let store = Store::new();
//! let state = store.wrap(&Target::from_pairs([("count", 3)]));
//!
//! // A cached, read-only key derived from `count`
//! let view = state.computed(ComputedDescriptors::new().define("doubled", |s| {
//!     s.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0) * 2.0
//! }));
//!
//! let sub = state.watch(|event| println!("{event}"), WatchOptions::default());
//!
//! // Watchers run before `set` returns; the computed key is already fresh
//! state.set("count", 5)?;
//! assert_eq!(view.get("doubled"), Some(Value::from(10)));
//!
//! sub.unsubscribe();
//! # Ok::<(), tether_core::ReactiveError>(())
//! ```

pub mod bind;
pub mod config;
pub mod error;
pub mod immutable;
pub mod reactive;
pub mod value;

pub use bind::{bind, bind_all, BindOptions, Binding, Element, MemoryElement};
pub use config::StoreConfig;
pub use error::{ReactiveError, Result};
pub use immutable::{
    clone, deep_diff, delete_path, diff, freeze, get_path, merge_path, set_path, Change,
    ChangeKind, History,
};
pub use reactive::{
    ChangeEvent, ComputedDescriptors, Reactive, Ref, Store, Subscription, WatchOptions, Wrapped,
};
pub use value::{Target, Value};
