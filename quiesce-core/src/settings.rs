//! Settings record consumed by the watcher.
//!
//! The core never reads configuration files itself; `quiesce-config` builds a
//! [`WatcherSettings`] and hands it over.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Suffixes of files that take part in grouping. Everything else is inert.
pub const DEFAULT_ELIGIBLE_SUFFIXES: &[&str] = &[".dcm", ".dcm.gz"];

/// Model tag sent along with every ready notification.
pub const DEFAULT_MODEL: &str = "medclip";

/// Convenience helper for consumers that work with owned strings (e.g. config
/// deserialisation layers).
pub fn default_eligible_suffixes_vec() -> Vec<String> {
    DEFAULT_ELIGIBLE_SUFFIXES
        .iter()
        .map(|suffix| suffix.to_string())
        .collect()
}

/// Worker pool size used when none is configured.
pub fn default_worker_count() -> usize {
    (num_cpus::get() * 2).max(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherSettings {
    /// Root of the study tree.
    pub directory_path: PathBuf,
    /// Notification endpoint.
    pub api_url: String,
    /// Quiet period after the last accepted file before a study is ready.
    pub timeout: Duration,
    /// Delay between the start of consecutive scans.
    pub poll_interval: Duration,
    /// Depth of the walk-to-worker queue.
    pub batch_size: usize,
    /// Number of scan workers.
    pub workers: usize,
    /// Tag forwarded with each notification.
    pub model: String,
    /// File name suffixes that mark eligible files.
    pub eligible_suffixes: Vec<String>,
}

impl WatcherSettings {
    pub fn new(directory_path: impl Into<PathBuf>, api_url: impl Into<String>) -> Self {
        Self {
            directory_path: directory_path.into(),
            api_url: api_url.into(),
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(10),
            batch_size: 100,
            workers: default_worker_count(),
            model: DEFAULT_MODEL.to_string(),
            eligible_suffixes: default_eligible_suffixes_vec(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}
