//! Viewer configuration
//!
//! - **value**: the dynamic config tree and its snapshots
//! - **path**: dot-delimited addresses into the tree
//! - **schema**: the typed `ViewerConfig` and its path table
//! - **store**: the reactive store holding live state and defaults

pub mod path;
pub mod schema;
pub mod store;
pub mod value;

pub use path::ConfigPath;
pub use schema::ViewerConfig;
pub use store::ConfigStore;
pub use value::{ConfigValue, Group, Snapshot, ValueKind};
