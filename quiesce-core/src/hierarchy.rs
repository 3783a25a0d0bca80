//! Tenant -> Study -> Series -> File aggregation.
//!
//! Every level is an ordered map keyed by id, and every level is reached
//! through a create-if-absent accessor, so re-inserting an id always updates
//! in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{GroupIds, StudyKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub id: String,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub id: String,
    pub files: BTreeMap<String, FileRecord>,
}

impl Series {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            files: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Study {
    pub id: String,
    pub series: BTreeMap<String, Series>,
    ready: bool,
    pub first_seen: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
}

impl Study {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            series: BTreeMap::new(),
            ready: false,
            first_seen: Utc::now(),
            ready_at: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn file_count(&self) -> usize {
        self.series.values().map(|series| series.files.len()).sum()
    }

    fn series_entry(&mut self, id: &str) -> &mut Series {
        self.series
            .entry(id.to_string())
            .or_insert_with(|| Series::new(id))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tenant {
    pub id: String,
    pub studies: BTreeMap<String, Study>,
}

impl Tenant {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            studies: BTreeMap::new(),
        }
    }
}

/// What an upsert did to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upsert {
    /// The study did not exist before this file.
    pub study_created: bool,
    /// The file id was new within its series.
    pub file_created: bool,
    /// The study had already stabilized when this file arrived.
    pub study_ready: bool,
}

/// Aggregate counts over the whole tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HierarchySummary {
    pub tenants: usize,
    pub open_studies: usize,
    pub ready_studies: usize,
    pub series: usize,
    pub files: usize,
}

#[derive(Debug, Default)]
pub struct Hierarchy {
    tenants: BTreeMap<String, Tenant>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh the record for one file.
    pub fn upsert(&mut self, ids: &GroupIds, path: &Path, modified: SystemTime) -> Upsert {
        let tenant = self
            .tenants
            .entry(ids.tenant.clone())
            .or_insert_with(|| Tenant::new(&ids.tenant));

        let study_created = !tenant.studies.contains_key(&ids.study);
        let study = tenant
            .studies
            .entry(ids.study.clone())
            .or_insert_with(|| Study::new(&ids.study));

        let record = FileRecord {
            id: ids.file.clone(),
            path: path.to_path_buf(),
            modified: DateTime::<Utc>::from(modified),
        };
        let file_created = study
            .series_entry(&ids.series)
            .files
            .insert(ids.file.clone(), record)
            .is_none();

        Upsert {
            study_created,
            file_created,
            study_ready: study.ready,
        }
    }

    /// Flip a study to ready.
    ///
    /// Returns false when the study is unknown or already ready, which keeps a
    /// duplicate deadline from producing a second transition.
    pub fn mark_ready(&mut self, key: &StudyKey) -> bool {
        match self.study_mut(key) {
            Some(study) if !study.ready => {
                study.ready = true;
                study.ready_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    pub fn study(&self, key: &StudyKey) -> Option<&Study> {
        self.tenants
            .get(&key.tenant)
            .and_then(|tenant| tenant.studies.get(&key.study))
    }

    fn study_mut(&mut self, key: &StudyKey) -> Option<&mut Study> {
        self.tenants
            .get_mut(&key.tenant)
            .and_then(|tenant| tenant.studies.get_mut(&key.study))
    }

    pub fn summary(&self) -> HierarchySummary {
        let mut summary = HierarchySummary {
            tenants: self.tenants.len(),
            ..HierarchySummary::default()
        };
        for study in self.tenants.values().flat_map(|t| t.studies.values()) {
            if study.ready {
                summary.ready_studies += 1;
            } else {
                summary.open_studies += 1;
            }
            summary.series += study.series.len();
            summary.files += study.file_count();
        }
        summary
    }
}
