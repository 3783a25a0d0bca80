//! Configuration loading for the Quiesce watcher.
//!
//! A TOML file supplies the base settings, `QUIESCE_*` environment variables
//! override individual keys, and the result is validated into the
//! [`quiesce_core::WatcherSettings`] record the core consumes.

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader};
pub use models::{Config, ConfigMetadata};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
