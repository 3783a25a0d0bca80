use std::path::PathBuf;
use std::time::Duration;

use quiesce_core::WatcherSettings;

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub watcher: WatcherSettings,
    /// Upper bound on a single notification request.
    pub notify_timeout: Duration,
    pub metadata: ConfigMetadata,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
