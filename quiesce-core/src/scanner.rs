//! One poll cycle: walk the study tree and feed files through the tracker.
//!
//! The walk runs on the calling task and pushes candidate paths into a bounded
//! channel; a fixed pool of workers drains it, stats each file and offers it to
//! the [`StudyTracker`]. A full channel blocks the walk rather than buffering.
//! Per-path failures are collected into the [`ScanReport`] and never stop the
//! pass.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::error::WatchError;
use crate::fs::FileSystem;
use crate::state::{Acceptance, StudyTracker};

/// Summary of one scan pass.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Regular files handed to the workers.
    pub files_seen: usize,
    /// Files that updated an open study.
    pub accepted: usize,
    /// Files that updated a study already marked ready.
    pub late_arrivals: usize,
    /// Files whose modification time had not moved.
    pub unchanged: usize,
    /// Files without an eligible suffix.
    pub ineligible: usize,
    /// Non-fatal walk and stat failures.
    pub errors: Vec<WatchError>,
    pub duration: Duration,
}

impl ScanReport {
    /// Files that mutated the tree, whether or not the study was still open.
    pub fn files_processed(&self) -> usize {
        self.accepted + self.late_arrivals
    }

    fn absorb(&mut self, worker: WorkerStats) {
        self.accepted += worker.accepted;
        self.late_arrivals += worker.late_arrivals;
        self.unchanged += worker.unchanged;
        self.ineligible += worker.ineligible;
        self.errors.extend(worker.errors);
    }
}

#[derive(Debug, Default)]
struct WorkerStats {
    accepted: usize,
    late_arrivals: usize,
    unchanged: usize,
    ineligible: usize,
    errors: Vec<WatchError>,
}

/// Walks a root directory and dispatches files to a worker pool.
pub struct Scanner {
    fs: Arc<dyn FileSystem>,
    workers: usize,
    batch_size: usize,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("workers", &self.workers)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Scanner {
    /// Create a scanner over a custom filesystem (useful for tests)
    pub fn new_with_fs(fs: Arc<dyn FileSystem>, workers: usize, batch_size: usize) -> Self {
        Self {
            fs,
            workers: workers.max(1),
            batch_size: batch_size.max(1),
        }
    }

    /// Run a single pass over `root`. Returns once every discovered file has
    /// been processed.
    pub async fn scan_once(&self, root: &Path, tracker: &Arc<StudyTracker>) -> ScanReport {
        let started = Instant::now();
        let root = Arc::new(root.to_path_buf());
        let (tx, rx) = mpsc::channel::<PathBuf>(self.batch_size);
        let rx = Arc::new(Mutex::new(rx));

        let handles: Vec<_> = (0..self.workers)
            .map(|worker_id| {
                tokio::spawn(file_worker(
                    worker_id,
                    Arc::clone(&rx),
                    Arc::clone(&self.fs),
                    Arc::clone(tracker),
                    Arc::clone(&root),
                ))
            })
            .collect();

        let mut report = ScanReport::default();
        self.walk(&root, &tx, &mut report).await;
        // Closing the sender lets the workers drain the queue and exit.
        drop(tx);

        for handle in handles {
            match handle.await {
                Ok(stats) => report.absorb(stats),
                Err(join_err) => report.errors.push(WatchError::Internal(format!(
                    "scan worker panicked: {join_err}"
                ))),
            }
        }

        report.duration = started.elapsed();
        info!(
            target: "quiesce::scan",
            root = %root.display(),
            files = report.files_seen,
            accepted = report.accepted,
            late = report.late_arrivals,
            unchanged = report.unchanged,
            ignored = report.ineligible,
            errors = report.errors.len(),
            elapsed_ms = report.duration.as_millis() as u64,
            "scan complete"
        );
        report
    }

    async fn walk(&self, root: &Path, tx: &mpsc::Sender<PathBuf>, report: &mut ScanReport) {
        let mut pending = VecDeque::from([root.to_path_buf()]);

        while let Some(dir) = pending.pop_front() {
            let mut entries = match self.fs.read_dir(&dir).await {
                Ok(entries) => entries,
                Err(message) => {
                    warn!(
                        target: "quiesce::scan",
                        dir = %dir.display(),
                        error = %message,
                        "failed to read directory"
                    );
                    report.errors.push(WatchError::Walk { path: dir, message });
                    continue;
                }
            };

            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) if entry.is_dir => pending.push_back(entry.path),
                    Ok(Some(entry)) => {
                        report.files_seen += 1;
                        if tx.send(entry.path).await.is_err() {
                            // Every worker is gone; nothing left to feed.
                            return;
                        }
                    }
                    Ok(None) => break,
                    // One bad entry; the rest of the directory is still listed.
                    Err(message) => {
                        warn!(
                            target: "quiesce::scan",
                            dir = %dir.display(),
                            error = %message,
                            "failed to list directory entry"
                        );
                        report.errors.push(WatchError::Walk {
                            path: dir.clone(),
                            message,
                        });
                    }
                }
            }
        }
    }
}

async fn file_worker(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    fs: Arc<dyn FileSystem>,
    tracker: Arc<StudyTracker>,
    root: Arc<PathBuf>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    loop {
        let next = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(path) = next else {
            break;
        };

        if !tracker.is_eligible(&path) {
            stats.ineligible += 1;
            continue;
        }

        let metadata = match fs.metadata(&path).await {
            Ok(metadata) => metadata,
            Err(message) => {
                warn!(
                    target: "quiesce::scan",
                    path = %path.display(),
                    error = %message,
                    "failed to stat file"
                );
                stats.errors.push(WatchError::Metadata { path, message });
                continue;
            }
        };
        if !metadata.is_file {
            continue;
        }

        let modified: SystemTime = metadata.modified.unwrap_or(UNIX_EPOCH);
        let relative = path.strip_prefix(root.as_path()).unwrap_or(path.as_path());
        match tracker.accept(&path, relative, modified).await {
            Acceptance::Accepted { .. } => stats.accepted += 1,
            Acceptance::LateArrival { .. } => stats.late_arrivals += 1,
            Acceptance::Unchanged => stats.unchanged += 1,
            Acceptance::Ineligible => stats.ineligible += 1,
        }
    }

    debug!(target: "quiesce::scan", worker_id, accepted = stats.accepted, "scan worker finished");
    stats
}
