use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use quiesce_core::fs::InMemoryFs;
use quiesce_core::{
    ChannelNotifier, ManualClock, StudyKey, StudyReady, StudyWatcher, UNKNOWN, WatchError,
    WatcherSettings,
};
use tokio::sync::mpsc::UnboundedReceiver;

const ROOT: &str = "/data/incoming";

struct Harness {
    fs: InMemoryFs,
    clock: ManualClock,
    watcher: StudyWatcher,
    ready_rx: UnboundedReceiver<StudyReady>,
}

impl Harness {
    fn new(timeout_secs: u64, workers: usize, batch_size: usize) -> Self {
        let fs = InMemoryFs::new();
        fs.add_dir(ROOT);
        let clock = ManualClock::new();
        let (notifier, ready_rx) = ChannelNotifier::new();
        let settings = WatcherSettings::new(ROOT, "http://localhost:9000/ready")
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_poll_interval(Duration::from_secs(2))
            .with_workers(workers)
            .with_batch_size(batch_size);
        let watcher = StudyWatcher::new_with(
            settings,
            Arc::new(fs.clone()),
            Arc::new(clock.clone()),
            Arc::new(notifier),
        );
        Self {
            fs,
            clock,
            watcher,
            ready_rx,
        }
    }

    fn add(&self, relative: &str, mtime_secs: u64) {
        self.fs
            .add_file(PathBuf::from(ROOT).join(relative), mtime(mtime_secs));
    }

    fn now_secs(&self) -> u64 {
        self.clock.elapsed().as_secs()
    }

    fn advance_to(&self, secs: u64) {
        let now = self.now_secs();
        assert!(secs >= now, "clock cannot go backwards");
        self.clock.advance(Duration::from_secs(secs - now));
    }
}

fn mtime(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
}

fn study(tenant: &str, study: &str) -> StudyKey {
    StudyKey::new(tenant, study)
}

#[tokio::test]
async fn two_arrivals_stabilize_once_after_last_reset() {
    let mut h = Harness::new(10, 4, 8);
    let key = study("tenantA", "study1");
    let mut ready_at = Vec::new();

    for t in 0..=24 {
        h.advance_to(t);
        if t == 0 {
            h.add("tenantA/study1/series1/img1.dcm", 0);
        }
        if t == 5 {
            h.add("tenantA/study1/series1/img2.dcm", 5);
        }
        if t % 2 == 0 {
            h.watcher.scan_once().await;
        }
        if t == 7 {
            let snapshot = h.watcher.tracker().study(&key).await.unwrap();
            assert_eq!(snapshot.file_count(), 2);
        }
        for event in h.watcher.fire_due().await {
            ready_at.push((t, event));
        }
    }

    assert_eq!(ready_at.len(), 1, "exactly one ready transition");
    let (t, event) = &ready_at[0];
    assert!((15..=17).contains(t), "ready fired at t={t}");
    assert_eq!(event.study, "study1");
    assert_eq!(event.tenant, "tenantA");

    let delivered = h.ready_rx.recv().await.unwrap();
    assert_eq!(delivered.study, "study1");
    assert!(h.ready_rx.try_recv().is_err());
}

#[tokio::test]
async fn ineligible_files_never_reach_a_series() {
    let h = Harness::new(10, 2, 4);
    h.add("tenantA/study1/series1/notes.txt", 0);

    let report = h.watcher.scan_once().await;
    assert_eq!(report.files_seen, 1);
    assert_eq!(report.ineligible, 1);
    assert_eq!(report.files_processed(), 0);

    let tracker = h.watcher.tracker();
    assert!(tracker.study(&study("tenantA", "study1")).await.is_none());
    let snapshot = tracker.snapshot().await;
    assert_eq!(snapshot.pending_deadlines, 0);
    assert_eq!(snapshot.cached_paths, 0);
}

#[tokio::test]
async fn unchanged_rescan_mutates_nothing() {
    let h = Harness::new(10, 4, 2);
    for i in 0..5 {
        h.add(&format!("tenantA/study1/series1/img{i}.dcm"), 0);
    }
    let key = study("tenantA", "study1");

    let first = h.watcher.scan_once().await;
    assert_eq!(first.accepted, 5);
    let resets = h.watcher.tracker().deadline_resets(&key).await;
    assert_eq!(resets, Some(4));

    h.advance_to(3);
    let second = h.watcher.scan_once().await;
    assert_eq!(second.accepted, 0);
    assert_eq!(second.unchanged, 5);
    assert_eq!(h.watcher.tracker().deadline_resets(&key).await, resets);

    // A newer mtime on one file counts as a change and pushes the deadline out.
    h.add("tenantA/study1/series1/img0.dcm", 3);
    let third = h.watcher.scan_once().await;
    assert_eq!(third.accepted, 1);
    assert_eq!(h.watcher.tracker().deadline_resets(&key).await, Some(5));

    h.advance_to(12);
    assert!(h.watcher.fire_due().await.is_empty(), "deadline moved to t=13");
    h.advance_to(13);
    assert_eq!(h.watcher.fire_due().await.len(), 1);
}

#[tokio::test]
async fn busy_study_does_not_delay_quiet_study() {
    let h = Harness::new(10, 4, 4);
    h.add("tenantA/quiet/series1/img.dcm", 0);

    let mut ready = Vec::new();
    for t in (0..=40).step_by(2) {
        h.advance_to(t);
        if t <= 30 {
            h.add(&format!("tenantB/busy/series1/img{t}.dcm"), t);
        }
        h.watcher.scan_once().await;
        for event in h.watcher.fire_due().await {
            ready.push((t, event.study));
        }
    }

    assert_eq!(
        ready,
        vec![(10, "quiet".to_string()), (40, "busy".to_string())]
    );
}

#[tokio::test]
async fn many_workers_still_fire_exactly_once() {
    let h = Harness::new(5, 16, 3);
    for series in 0..10 {
        for file in 0..30 {
            h.add(&format!("tenantA/study1/series{series}/img{file}.dcm.gz"), 0);
        }
    }

    let report = h.watcher.scan_once().await;
    assert_eq!(report.accepted, 300);
    assert!(report.errors.is_empty());

    let key = study("tenantA", "study1");
    let tracked = h.watcher.tracker().study(&key).await.unwrap();
    assert_eq!(tracked.series.len(), 10);
    assert_eq!(tracked.file_count(), 300);
    assert_eq!(h.watcher.tracker().deadline_resets(&key).await, Some(299));

    h.advance_to(5);
    let (a, b) = tokio::join!(h.watcher.fire_due(), h.watcher.fire_due());
    assert_eq!(a.len() + b.len(), 1);
    assert!(h.watcher.fire_due().await.is_empty());
}

#[tokio::test]
async fn shallow_paths_land_in_unknown_group() {
    let h = Harness::new(1, 2, 2);
    h.add("loose.dcm", 0);
    h.add("study9/other.dcm", 0);

    let report = h.watcher.scan_once().await;
    assert_eq!(report.accepted, 2);
    assert!(report.errors.is_empty());

    let unknown = study(UNKNOWN, UNKNOWN);
    let tracked = h.watcher.tracker().study(&unknown).await.unwrap();
    let files: Vec<_> = tracked.series[UNKNOWN].files.keys().cloned().collect();
    assert_eq!(files, vec!["loose.dcm".to_string(), "other.dcm".to_string()]);

    h.advance_to(1);
    let fired = h.watcher.fire_due().await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].study, UNKNOWN);
}

#[tokio::test]
async fn ready_studies_stay_ready_on_late_arrival() {
    let mut h = Harness::new(4, 2, 2);
    h.add("tenantA/study1/series1/img1.dcm", 0);
    h.watcher.scan_once().await;

    h.advance_to(4);
    assert_eq!(h.watcher.fire_due().await.len(), 1);

    h.advance_to(6);
    h.add("tenantA/study1/series2/img9.dcm", 6);
    let report = h.watcher.scan_once().await;
    assert_eq!(report.late_arrivals, 1);
    assert_eq!(report.accepted, 0);

    h.advance_to(60);
    assert!(h.watcher.fire_due().await.is_empty());

    let key = study("tenantA", "study1");
    let tracked = h.watcher.tracker().study(&key).await.unwrap();
    assert!(tracked.is_ready());
    assert_eq!(tracked.file_count(), 2);
    assert!(!h.watcher.tracker().has_deadline(&key).await);

    assert!(h.ready_rx.recv().await.is_some());
    assert!(h.ready_rx.try_recv().is_err());
}

#[tokio::test]
async fn io_failures_are_reported_without_aborting_the_scan() {
    let h = Harness::new(10, 2, 2);
    h.fs
        .add_unreadable(PathBuf::from(ROOT).join("tenantA/study1/series1/broken.dcm"));
    h.add("tenantA/study1/series1/good.dcm", 0);

    let report = h.watcher.scan_once().await;
    assert_eq!(report.accepted, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0], WatchError::Metadata { .. }));

    let missing = Harness::new(10, 2, 2);
    let scanner = quiesce_core::Scanner::new_with_fs(Arc::new(missing.fs.clone()), 2, 2);
    let report = scanner
        .scan_once(
            std::path::Path::new("/does/not/exist"),
            missing.watcher.tracker(),
        )
        .await;
    assert_eq!(report.files_seen, 0);
    assert!(matches!(report.errors.as_slice(), [WatchError::Walk { .. }]));
}

#[tokio::test]
async fn failed_directory_entry_does_not_hide_its_siblings() {
    let h = Harness::new(10, 2, 2);
    h.fs
        .add_vanished(PathBuf::from(ROOT).join("tenantA/study1/series1/a.dcm"));
    h.add("tenantA/study1/series1/b.dcm", 0);
    h.add("tenantA/study1/series1/c.dcm", 0);

    let report = h.watcher.scan_once().await;
    assert_eq!(report.files_seen, 2);
    assert_eq!(report.accepted, 2);
    assert!(matches!(report.errors.as_slice(), [WatchError::Walk { .. }]));

    let tracked = h
        .watcher
        .tracker()
        .study(&study("tenantA", "study1"))
        .await
        .unwrap();
    assert_eq!(tracked.file_count(), 2);
}
