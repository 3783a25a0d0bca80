use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use quiesce_core::fs::RealFs;
use quiesce_core::{ChannelNotifier, ManualClock, StudyKey, StudyWatcher, WatcherSettings};
use tempfile::tempdir;

fn write_file(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"DICM").unwrap();
}

#[tokio::test]
async fn scans_a_real_directory_tree() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "tenantA/study1/series1/img1.dcm");
    write_file(dir.path(), "tenantA/study1/series2/img2.dcm.gz");
    write_file(dir.path(), "tenantA/study1/series1/readme.txt");

    let clock = ManualClock::new();
    let (notifier, _rx) = ChannelNotifier::new();
    let settings = WatcherSettings::new(dir.path(), "http://localhost/ready")
        .with_timeout(Duration::from_secs(30))
        .with_workers(3)
        .with_batch_size(1);
    let watcher = StudyWatcher::new_with(
        settings,
        Arc::new(RealFs::new()),
        Arc::new(clock.clone()),
        Arc::new(notifier),
    );

    let report = watcher.scan_once().await;
    assert_eq!(report.files_seen, 3);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.ineligible, 1);
    assert!(report.errors.is_empty());

    let key = StudyKey::new("tenantA", "study1");
    let study = watcher.tracker().study(&key).await.unwrap();
    assert_eq!(study.series.len(), 2);

    let rescan = watcher.scan_once().await;
    assert_eq!(rescan.accepted, 0);
    assert_eq!(rescan.unchanged, 2);

    // Touch one file with a later mtime.
    let touched = dir.path().join("tenantA/study1/series1/img1.dcm");
    let file = fs::File::options().write(true).open(&touched).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    drop(file);

    let after_touch = watcher.scan_once().await;
    assert_eq!(after_touch.accepted, 1);
    assert_eq!(watcher.tracker().deadline_resets(&key).await, Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn started_watcher_notifies_once_in_real_time() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "tenantA/study1/series1/img1.dcm");

    let (notifier, mut rx) = ChannelNotifier::new();
    let settings = WatcherSettings::new(dir.path(), "http://localhost/ready")
        .with_timeout(Duration::from_millis(200))
        .with_poll_interval(Duration::from_millis(50))
        .with_workers(2);
    let watcher = Arc::new(StudyWatcher::new(settings, Arc::new(notifier)));
    let handle = Arc::clone(&watcher).start();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("study should stabilize")
        .expect("notifier channel open");
    assert_eq!(event.tenant, "tenantA");
    assert_eq!(event.study, "study1");

    // Keep polling for a while; the ready study must not fire again.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(rx.try_recv().is_err());

    handle.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_waits_for_tasks_and_scanning_ends() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "tenantA/study1/series1/img1.dcm");

    let (notifier, _rx) = ChannelNotifier::new();
    let settings = WatcherSettings::new(dir.path(), "http://localhost/ready")
        .with_timeout(Duration::from_secs(3600))
        .with_poll_interval(Duration::from_millis(20));
    let watcher = Arc::new(StudyWatcher::new(settings, Arc::new(notifier)));
    let handle = Arc::clone(&watcher).start();

    tokio::time::sleep(Duration::from_millis(100)).await;
    tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .expect("stop should return once both tasks exit");

    let before = watcher.tracker().snapshot().await;
    assert_eq!(before.cached_paths, 1);
    assert_eq!(before.pending_deadlines, 1);

    write_file(dir.path(), "tenantA/study1/series1/img2.dcm");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(watcher.tracker().snapshot().await.cached_paths, 1);
}
