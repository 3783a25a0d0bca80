//! Per-study quiet-period deadlines.
//!
//! The table holds at most one deadline per study. Arming an existing entry
//! pushes it out to `now + timeout`; [`DebounceTable::take_due`] removes and
//! returns every entry whose deadline has passed. Removal and expiry happen in
//! the same call, so an entry can never be reported due twice.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::classify::StudyKey;

/// Stand-in for "never" when `now + timeout` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Deadline {
    due: Instant,
    resets: u32,
}

/// Result of arming a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Armed {
    /// No deadline existed; one was created.
    Started,
    /// The existing deadline was pushed out.
    Reset,
}

#[derive(Debug)]
pub struct DebounceTable {
    timeout: Duration,
    deadlines: HashMap<StudyKey, Deadline>,
}

impl DebounceTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadlines: HashMap::new(),
        }
    }

    /// Start or extend the deadline for `key`.
    pub fn arm(&mut self, key: &StudyKey, now: Instant) -> Armed {
        let due = now
            .checked_add(self.timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        match self.deadlines.get_mut(key) {
            Some(deadline) => {
                deadline.due = due;
                deadline.resets += 1;
                Armed::Reset
            }
            None => {
                self.deadlines
                    .insert(key.clone(), Deadline { due, resets: 0 });
                Armed::Started
            }
        }
    }

    /// Remove and return every study whose deadline is at or before `now`,
    /// earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<StudyKey> {
        let mut due: Vec<(Instant, StudyKey)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| deadline.due <= now)
            .map(|(key, deadline)| (deadline.due, key.clone()))
            .collect();
        due.sort();

        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().map(|deadline| deadline.due).min()
    }

    pub fn deadline(&self, key: &StudyKey) -> Option<Instant> {
        self.deadlines.get(key).map(|deadline| deadline.due)
    }

    /// How many times the deadline for `key` has been pushed out.
    pub fn resets(&self, key: &StudyKey) -> Option<u32> {
        self.deadlines.get(key).map(|deadline| deadline.resets)
    }

    pub fn contains(&self, key: &StudyKey) -> bool {
        self.deadlines.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
