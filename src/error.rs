//! Usage errors surfaced by the config store

use thiserror::Error;

/// Errors returned to callers of [`crate::ConfigStore`] and friends.
///
/// These are contract violations by the caller. Faults raised inside
/// subscribers or listeners never show up here; they are logged and contained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Empty path, or a path with an empty segment
    #[error("invalid config path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// A path tried to descend through a leaf value
    #[error("cannot descend into '{segment}' while resolving '{path}': it holds a value, not a group")]
    NotAGroup { path: String, segment: String },

    /// `reset_path` on a location the defaults know nothing about
    #[error("no default value exists at '{path}'")]
    NoDefault { path: String },

    /// A JSON value with no config representation (null, arrays)
    #[error("unsupported config value: {0}")]
    UnsupportedValue(String),
}
