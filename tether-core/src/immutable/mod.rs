//! Immutable Utilities
//!
//! Pure functions over plain [`Target`](crate::value::Target)s. Nothing here
//! touches a store or fires a listener; feed them `to_raw` or `snapshot`
//! output.
//!
//! # Copy-on-write
//!
//! The path writers (`set_path`, `delete_path`, `merge_path`) copy every
//! container along the path and nothing else. Untouched siblings are shared
//! by reference between the old and the new root, so `Target::ptr_eq` on a
//! sibling tells whether that branch changed.
//!
//! # Cycles
//!
//! `clone` preserves cycles. `freeze` visits each container once;
//! `deep_diff` stops on a container pair already on the current descent.

mod copy;
mod diff;
mod history;
mod path;

use smallvec::SmallVec;

pub use copy::{clone, freeze, freeze_target};
pub(crate) use copy::clone_target;
pub use diff::{deep_diff, deep_diff_at, diff, equals, patch, Change, ChangeKind};
pub use history::History;
pub use path::{delete_path, get_path, merge_path, set_path};

/// Split a dot-separated path. The empty path has no segments.
pub fn split_path(path: &str) -> SmallVec<[&str; 4]> {
    if path.is_empty() {
        SmallVec::new()
    } else {
        path.split('.').collect()
    }
}
