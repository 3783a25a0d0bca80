//! Positional path classification.
//!
//! A study tree is laid out as `<tenant>/<study>/<series>/<file>`. The ids are
//! taken from the last four path segments; anything shallower lands in the
//! shared [`UNKNOWN`] group instead of being rejected.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Sentinel id for every grouping level of a path that is too shallow.
pub const UNKNOWN: &str = "unknown";

/// Identifies a study across tenants.
#[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudyKey {
    pub tenant: String,
    pub study: String,
}

impl StudyKey {
    pub fn new(tenant: impl Into<String>, study: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            study: study.into(),
        }
    }
}

impl fmt::Display for StudyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.study)
    }
}

/// The four ids extracted from a file path.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroupIds {
    pub tenant: String,
    pub study: String,
    pub series: String,
    pub file: String,
}

impl GroupIds {
    pub fn study_key(&self) -> StudyKey {
        StudyKey::new(self.tenant.clone(), self.study.clone())
    }

    pub fn is_unknown(&self) -> bool {
        self.study == UNKNOWN && self.tenant == UNKNOWN && self.series == UNKNOWN
    }
}

/// Map a path to its (tenant, study, series, file) ids.
///
/// Both `/` and `\` separate segments and empty segments are skipped, so
/// `a//b` and `a\b` classify like `a/b`.
pub fn classify(path: &Path) -> GroupIds {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let segments: Vec<&str> = normalized
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        [.., tenant, study, series, file] => GroupIds {
            tenant: (*tenant).to_string(),
            study: (*study).to_string(),
            series: (*series).to_string(),
            file: (*file).to_string(),
        },
        _ => GroupIds {
            tenant: UNKNOWN.to_string(),
            study: UNKNOWN.to_string(),
            series: UNKNOWN.to_string(),
            file: segments.last().copied().unwrap_or_default().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_last_four_segments() {
        let ids = classify(Path::new("tenantA/study1/series1/img1.dcm"));
        assert_eq!(ids.tenant, "tenantA");
        assert_eq!(ids.study, "study1");
        assert_eq!(ids.series, "series1");
        assert_eq!(ids.file, "img1.dcm");

        let deep = classify(Path::new("/mnt/incoming/tenantB/s2/ser9/x.dcm.gz"));
        assert_eq!(deep.study_key(), StudyKey::new("tenantB", "s2"));
        assert_eq!(deep.file, "x.dcm.gz");
    }

    #[test]
    fn shallow_paths_fall_back_to_unknown_group() {
        let ids = classify(Path::new("study1/img1.dcm"));
        assert!(ids.is_unknown());
        assert_eq!(ids.file, "img1.dcm");

        let bare = classify(Path::new("img.dcm"));
        assert!(bare.is_unknown());
        assert_eq!(bare.file, "img.dcm");

        assert_eq!(classify(Path::new("")).file, "");
    }

    #[test]
    fn backslashes_and_empty_segments_are_normalized() {
        let ids = classify(Path::new(r"tenantA\study1\series1\img1.dcm"));
        assert_eq!(ids.study_key(), StudyKey::new("tenantA", "study1"));

        let doubled = classify(Path::new("tenantA//study1/series1/img1.dcm"));
        assert_eq!(doubled, ids);
    }
}
