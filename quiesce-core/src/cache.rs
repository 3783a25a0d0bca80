//! Change detection by modification time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Decides which files take part in grouping at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixFilter {
    suffixes: Vec<String>,
}

impl SuffixFilter {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes
                .into_iter()
                .map(Into::into)
                .filter(|suffix: &String| !suffix.is_empty())
                .collect(),
        }
    }

    /// Case-sensitive match against the file name only.
    pub fn is_eligible(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }
}

impl Default for SuffixFilter {
    fn default() -> Self {
        Self::new(crate::settings::DEFAULT_ELIGIBLE_SUFFIXES.iter().copied())
    }
}

/// Last observed modification time per path.
///
/// Entries are only ever added or moved forward; a file that disappears from
/// disk keeps its entry for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: HashMap<PathBuf, SystemTime>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the path is unseen or `modified` is strictly newer.
    pub fn should_process(&self, path: &Path, modified: SystemTime) -> bool {
        match self.entries.get(path) {
            Some(seen) => *seen < modified,
            None => true,
        }
    }

    pub fn record(&mut self, path: &Path, modified: SystemTime) {
        self.entries.insert(path.to_path_buf(), modified);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn processes_unseen_and_strictly_newer_only() {
        let mut cache = MetadataCache::new();
        let path = Path::new("t/s/se/a.dcm");
        let t0 = UNIX_EPOCH + Duration::from_secs(100);

        assert!(cache.should_process(path, t0));
        cache.record(path, t0);

        assert!(!cache.should_process(path, t0));
        assert!(!cache.should_process(path, t0 - Duration::from_secs(1)));
        assert!(cache.should_process(path, t0 + Duration::from_millis(1)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn default_filter_accepts_dicom_and_compressed_dicom() {
        let filter = SuffixFilter::default();
        assert!(filter.is_eligible(Path::new("a/b/c/img.dcm")));
        assert!(filter.is_eligible(Path::new("a/b/c/img.dcm.gz")));
        assert!(!filter.is_eligible(Path::new("a/b/c/notes.txt")));
        assert!(!filter.is_eligible(Path::new("a/b/c/img.gz")));
        assert!(!filter.is_eligible(Path::new("a/b/c/img.DCM")));
        assert!(!filter.is_eligible(Path::new("/")));
    }
}
