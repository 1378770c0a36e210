//! Application-wide constants
//!
//! String literals shared by the store, the event bus and the binary,
//! kept in one place so call sites never spell them twice.

/// Config path constants
pub mod path {
    /// Separator between segments of a config path (`lights.key.intensity`)
    pub const SEPARATOR: char = '.';
}

/// Well-known event names raised through the event bus
pub mod events {
    /// A model finished loading; payload carries the asset name
    pub const ASSET_LOADED: &str = "asset:loaded";

    /// The user asked for an export of the current view
    pub const EXPORT_REQUESTED: &str = "export:requested";

    /// The user asked to reset every setting to its default
    pub const RESET_REQUESTED: &str = "reset:requested";
}

/// Logging setup
pub mod logging {
    /// Environment variable read by the binary to pick the max log level
    pub const LEVEL_ENV: &str = "LOG_LEVEL";

    /// Level used when the variable is unset or unrecognized
    pub const DEFAULT_LEVEL: &str = "info";
}
