//! Reactive state for an interactive 3D asset viewer
//!
//! [`ConfigStore`] holds every tunable view setting (camera, lights,
//! post-processing, materials) and broadcasts snapshots on change.
//! [`EventBus`] carries one-off signals between components that do not
//! know about each other.

#![forbid(unsafe_code)]

pub mod color;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod event_bus;
pub mod registry;

pub use color::HexColor;
pub use config::{ConfigPath, ConfigStore, ConfigValue, Group, Snapshot, ViewerConfig};
pub use context::AppContext;
pub use error::StoreError;
pub use event_bus::{EventBus, Handler};
pub use registry::{ListenerId, Subscription};
