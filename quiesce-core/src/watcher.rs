use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep_until};
use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::fs::{FileSystem, RealFs};
use crate::notify::{ReadyNotifier, StudyReady};
use crate::scanner::{ScanReport, Scanner};
use crate::settings::WatcherSettings;
use crate::state::StudyTracker;

/// Periodically scans the study tree and drives study deadlines.
pub struct StudyWatcher {
    settings: WatcherSettings,
    scanner: Scanner,
    tracker: Arc<StudyTracker>,
}

impl fmt::Debug for StudyWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyWatcher")
            .field("settings", &self.settings)
            .field("scanner", &self.scanner)
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl StudyWatcher {
    /// Create a watcher over the real filesystem and wall clock.
    pub fn new(settings: WatcherSettings, notifier: Arc<dyn ReadyNotifier>) -> Self {
        Self::new_with(settings, Arc::new(RealFs::new()), Arc::new(SystemClock), notifier)
    }

    /// Create a watcher with a custom filesystem and clock (useful for tests)
    pub fn new_with(
        settings: WatcherSettings,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn ReadyNotifier>,
    ) -> Self {
        let scanner = Scanner::new_with_fs(fs, settings.workers, settings.batch_size);
        let tracker = Arc::new(StudyTracker::new(&settings, clock, notifier));
        Self {
            settings,
            scanner,
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<StudyTracker> {
        &self.tracker
    }

    /// Run one scan over the configured root.
    pub async fn scan_once(&self) -> ScanReport {
        self.scanner
            .scan_once(&self.settings.directory_path, &self.tracker)
            .await
    }

    /// Fire every elapsed deadline now.
    pub async fn fire_due(&self) -> Vec<StudyReady> {
        self.tracker.fire_due().await
    }

    /// Start the poll loop and the deadline driver.
    ///
    /// Scans never overlap: the next tick is only awaited after the current
    /// scan has returned. Shutdown is checked between scans, so a scan that
    /// is already running completes first.
    pub fn start(self: Arc<Self>) -> WatcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let watcher = Arc::clone(&self);
        let mut poll_shutdown = shutdown_rx.clone();
        let poll_task = tokio::spawn(async move {
            info!(
                root = %watcher.settings.directory_path.display(),
                poll_interval_secs = watcher.settings.poll_interval.as_secs(),
                timeout_secs = watcher.settings.timeout.as_secs(),
                "study watcher started"
            );

            let mut ticker = interval(watcher.settings.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = poll_shutdown.changed() => {
                        info!("study watcher shutting down");
                        break;
                    }
                }

                let report = watcher.scan_once().await;
                if !report.errors.is_empty() {
                    for err in &report.errors {
                        debug!(target: "quiesce::scan", error = %err, "scan error");
                    }
                    error!(
                        target: "quiesce::scan",
                        errors = report.errors.len(),
                        "scan finished with errors"
                    );
                }

                let snapshot = watcher.tracker.snapshot().await;
                debug!(target: "quiesce::scan", ?snapshot, "tracker state");
            }
        });

        let tracker = Arc::clone(&self.tracker);
        let deadline_task = tokio::spawn(run_deadlines(tracker, shutdown_rx));

        WatcherHandle {
            poll_task,
            deadline_task,
            shutdown: shutdown_tx,
        }
    }
}

/// Sleep until the earliest deadline, fire, repeat. A newly created deadline
/// wakes the loop so it can re-plan.
async fn run_deadlines(tracker: Arc<StudyTracker>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let next = tracker.next_deadline().await;
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tracker.deadline_changed() => continue,
            _ = sleep_until_deadline(next) => {}
        }

        tracker.fire_due().await;
    }
    debug!("deadline driver stopped");
}

async fn sleep_until_deadline(next: Option<tokio::time::Instant>) {
    match next {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Handle to a running watcher.
#[derive(Debug)]
pub struct WatcherHandle {
    poll_task: JoinHandle<()>,
    deadline_task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl WatcherHandle {
    /// Stop polling and wait for both tasks to exit. A scan in progress is
    /// allowed to finish; pending deadlines are dropped, not fired.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.poll_task.await {
            error!(error = %e, "poll task ended abnormally");
        }
        if let Err(e) = self.deadline_task.await {
            error!(error = %e, "deadline task ended abnormally");
        }
        info!("study watcher stopped");
    }
}
