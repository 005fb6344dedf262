//! Reactive Primitives
//!
//! This module turns plain containers into observable proxies and builds
//! watchers, computed keys and single-value refs on top of them.
//!
//! # Concepts
//!
//! ## Proxies
//!
//! A [`Reactive`] wraps one [`Target`](crate::value::Target). Reads go through
//! it so they can be tracked; writes go through it so listeners can be told.
//! The [`Store`] guarantees one proxy per target.
//!
//! ## Watchers
//!
//! A watcher is a callback run synchronously on every write or delete made
//! through a proxy. See [`Store::watch`] and [`Store::watch_path`].
//!
//! ## Computed Keys
//!
//! A computed key is a cached, read-only key whose getter re-runs only when
//! something it read changes. See [`Store::computed`].
//!
//! ## Refs
//!
//! A [`Ref`] is a standalone reactive value with its own watchers.
//!
//! # Implementation Notes
//!
//! Dependency tracking uses a thread-local stack of tracking frames: while a
//! computed getter runs, every proxy read is appended to the innermost frame.
//!
//! Everything is synchronous. A write returns only after every listener it
//! triggered has run, including listeners triggered by writes those listeners
//! made. Such chains terminate because unchanged writes are no-ops.

mod cell;
mod computed;
mod context;
mod registry;
mod store;
mod subscriber;
mod watch;

pub use cell::Ref;
pub use computed::{ComputedDescriptors, Getter};
pub use context::{Dependency, ReactiveContext};
pub use registry::{DeleteListener, GetListener, HandlerRegistry, SetListener};
pub use store::{Reactive, ReactiveOptions, Store, Wrapped};
pub use subscriber::{ListenerId, Subscription};
pub use watch::{ChangeEvent, WatchOptions};
