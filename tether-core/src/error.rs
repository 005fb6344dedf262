//! Error types shared by the store, the path utilities and configuration.

use thiserror::Error;

use crate::value::TargetId;

/// Errors returned by the reactive engine.
///
/// Only caller mistakes surface as errors. Paths that do not resolve yet are
/// tolerated by `watch_path` and the binding engine and never reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// `watch` was called on a target that was never passed through the store.
    #[error("target {0} has not been made reactive; wrap it with Store::wrap first")]
    NotReactive(TargetId),

    /// A write or delete hit a computed key.
    #[error("property `{key}` is computed and cannot be written")]
    ReadOnly { key: String },

    /// A write or delete hit a frozen target.
    #[error("target {0} is frozen")]
    Frozen(TargetId),

    /// A sequence was addressed with something other than a decimal index.
    #[error("`{key}` is not a valid sequence index")]
    InvalidKey { key: String },

    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// A cyclic structure was exported to JSON.
    #[error("cyclic structure cannot be converted to JSON")]
    Cycle,

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
