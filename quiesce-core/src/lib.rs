//! # Quiesce Core
//!
//! Polls a directory tree laid out as `<tenant>/<study>/<series>/<file>` and
//! decides when each study has stopped receiving files.
//!
//! Every poll cycle walks the whole tree. Files whose modification time moved
//! since the last cycle are aggregated into an in-memory tenant/study/series
//! tree and push their study's quiet-period deadline out. When a deadline
//! elapses the study becomes ready, which happens once per study, and a
//! [`notify::ReadyNotifier`] is invoked off the scanning path.
//!
//! The pieces, leaves first:
//!
//! - [`classify`]: path to (tenant, study, series, file) ids
//! - [`cache`]: modification-time change detection and suffix filtering
//! - [`hierarchy`]: the study tree
//! - [`debounce`]: per-study deadlines
//! - [`state`]: the single-lock aggregate tying the three together
//! - [`scanner`]: walk plus bounded worker pool
//! - [`watcher`]: poll loop and deadline driver

pub mod cache;
pub mod classify;
pub mod clock;
pub mod debounce;
pub mod error;
pub mod fs;
pub mod hierarchy;
pub mod notify;
pub mod scanner;
pub mod settings;
pub mod state;
pub mod watcher;

pub use classify::{GroupIds, StudyKey, UNKNOWN, classify};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, WatchError};
pub use notify::{ChannelNotifier, ReadyNotifier, StudyReady};
pub use scanner::{ScanReport, Scanner};
pub use settings::WatcherSettings;
pub use state::{Acceptance, StudyTracker, TrackerSnapshot};
pub use watcher::{StudyWatcher, WatcherHandle};
