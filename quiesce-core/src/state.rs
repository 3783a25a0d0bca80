//! Shared stabilization state.
//!
//! The metadata cache, the study tree and the deadline table form one
//! aggregate behind a single lock. Accepting a file (cache check, cache update,
//! tree upsert, deadline arm) and firing deadlines (deadline removal, ready
//! flag) each happen inside one critical section; notifications are spawned
//! only after the lock is released.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::{MetadataCache, SuffixFilter};
use crate::classify::{StudyKey, classify};
use crate::clock::Clock;
use crate::debounce::{Armed, DebounceTable};
use crate::hierarchy::{Hierarchy, HierarchySummary, Study};
use crate::notify::{NotificationDispatcher, ReadyNotifier, StudyReady};
use crate::settings::WatcherSettings;

/// Outcome of offering one file to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// New or changed file for an open study; its deadline was armed.
    Accepted { key: StudyKey, armed: Armed },
    /// New or changed file for a study that is already ready. The record is
    /// refreshed but readiness is sticky and no deadline is created.
    LateArrival { key: StudyKey },
    /// Modification time not newer than the cached one.
    Unchanged,
    /// File name does not carry an eligible suffix.
    Ineligible,
}

/// Point-in-time view of the tracker, mostly for logging.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub hierarchy: HierarchySummary,
    pub pending_deadlines: usize,
    pub cached_paths: usize,
    pub late_arrivals: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct WatchState {
    cache: MetadataCache,
    tree: Hierarchy,
    deadlines: DebounceTable,
    late_arrivals: u64,
    last_activity: Option<DateTime<Utc>>,
}

/// Owns the stabilization state machine for every study.
pub struct StudyTracker {
    state: Mutex<WatchState>,
    filter: SuffixFilter,
    model: String,
    clock: Arc<dyn Clock>,
    dispatcher: NotificationDispatcher,
    deadline_changed: Notify,
}

impl fmt::Debug for StudyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("StudyTracker");
        debug.field("filter", &self.filter).field("model", &self.model);
        match self.state.try_lock() {
            Ok(state) => {
                debug
                    .field("pending_deadlines", &state.deadlines.len())
                    .field("cached_paths", &state.cache.len());
            }
            Err(_) => {
                debug.field("state", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl StudyTracker {
    pub fn new(
        settings: &WatcherSettings,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn ReadyNotifier>,
    ) -> Self {
        Self {
            state: Mutex::new(WatchState {
                cache: MetadataCache::new(),
                tree: Hierarchy::new(),
                deadlines: DebounceTable::new(settings.timeout),
                late_arrivals: 0,
                last_activity: None,
            }),
            filter: SuffixFilter::new(settings.eligible_suffixes.iter().cloned()),
            model: settings.model.clone(),
            clock,
            dispatcher: NotificationDispatcher::new(notifier),
            deadline_changed: Notify::new(),
        }
    }

    pub fn is_eligible(&self, path: &Path) -> bool {
        self.filter.is_eligible(path)
    }

    /// Offer a file observed on disk.
    ///
    /// `path` keys the metadata cache and is stored on the file record;
    /// `relative` (the path below the scan root) is what gets classified.
    pub async fn accept(&self, path: &Path, relative: &Path, modified: SystemTime) -> Acceptance {
        if !self.filter.is_eligible(path) {
            return Acceptance::Ineligible;
        }

        let ids = classify(relative);
        let key = ids.study_key();

        let mut state = self.state.lock().await;
        if !state.cache.should_process(path, modified) {
            return Acceptance::Unchanged;
        }

        let upsert = state.tree.upsert(&ids, path, modified);
        state.cache.record(path, modified);
        state.last_activity = Some(Utc::now());

        if upsert.study_ready {
            state.late_arrivals += 1;
            drop(state);
            debug!(
                target: "quiesce::scan",
                tenant = %key.tenant,
                study = %key.study,
                path = %path.display(),
                "file arrived after study was marked ready"
            );
            return Acceptance::LateArrival { key };
        }

        let now = self.clock.now();
        let armed = state.deadlines.arm(&key, now);
        drop(state);

        if armed == Armed::Started {
            info!(
                target: "quiesce::scan",
                tenant = %key.tenant,
                study = %key.study,
                "tracking new study"
            );
            self.deadline_changed.notify_one();
        }
        debug!(
            target: "quiesce::scan",
            tenant = %key.tenant,
            study = %key.study,
            series = %ids.series,
            file = %ids.file,
            "accepted file"
        );

        Acceptance::Accepted { key, armed }
    }

    /// Transition every study whose quiet period has elapsed to ready and
    /// dispatch one notification per transition.
    pub async fn fire_due(&self) -> Vec<StudyReady> {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            for key in state.deadlines.take_due(now) {
                if state.tree.mark_ready(&key) {
                    events.push(StudyReady::new(&key, self.model.clone()));
                }
            }
        }

        for event in &events {
            info!(
                target: "quiesce::ready",
                tenant = %event.tenant,
                study = %event.study,
                "study stabilized"
            );
            self.dispatcher.dispatch(event.clone());
        }

        events
    }

    pub async fn next_deadline(&self) -> Option<Instant> {
        self.state.lock().await.deadlines.next_deadline()
    }

    /// Resolves once a new deadline has been created since the last wait.
    pub async fn deadline_changed(&self) {
        self.deadline_changed.notified().await;
    }

    pub async fn study(&self, key: &StudyKey) -> Option<Study> {
        self.state.lock().await.tree.study(key).cloned()
    }

    pub async fn has_deadline(&self, key: &StudyKey) -> bool {
        self.state.lock().await.deadlines.contains(key)
    }

    /// How often the deadline of `key` has been pushed out, if it is pending.
    pub async fn deadline_resets(&self, key: &StudyKey) -> Option<u32> {
        self.state.lock().await.deadlines.resets(key)
    }

    pub async fn snapshot(&self) -> TrackerSnapshot {
        let state = self.state.lock().await;
        TrackerSnapshot {
            hierarchy: state.tree.summary(),
            pending_deadlines: state.deadlines.len(),
            cached_paths: state.cache.len(),
            late_arrivals: state.late_arrivals,
            last_activity: state.last_activity,
        }
    }
}
