use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

/// Minimal, async-capable filesystem abstraction used by the scanner.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Open a directory for iteration.
    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream + Send>, String>;

    /// Fetch lightweight file metadata, following symlinks.
    async fn metadata(&self, path: &Path) -> Result<FsMetadata, String>;
}

/// Lightweight metadata needed by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct FsMetadata {
    pub is_file: bool,
    /// Last modified time if available
    pub modified: Option<SystemTime>,
}

/// Entry yielded while iterating a directory.
///
/// `is_dir` reflects the entry itself without following symlinks, so a link
/// to a directory is handed to the workers as a candidate file and dropped
/// there once its metadata says it is not a regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Async directory iterator (similar to tokio::fs::ReadDir).
///
/// An `Err` covers a single entry; callers keep iterating until `Ok(None)`.
/// Implementations must end the stream after a failure of the listing
/// itself.
#[async_trait]
pub trait ReadDirStream {
    /// Return the next entry, or None when exhausted.
    async fn next_entry(&mut self) -> Result<Option<DirEntry>, String>;
}

/// Real filesystem implementation backed by tokio::fs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream + Send>, String> {
        let rd = tokio::fs::read_dir(path)
            .await
            .map_err(|e| format!("read_dir failed for {:?}: {}", path, e))?;
        Ok(Box::new(RealReadDir {
            inner: rd,
            exhausted: false,
        }))
    }

    async fn metadata(&self, path: &Path) -> Result<FsMetadata, String> {
        let md = tokio::fs::metadata(path)
            .await
            .map_err(|e| format!("metadata failed for {:?}: {}", path, e))?;
        Ok(FsMetadata {
            is_file: md.is_file(),
            modified: md.modified().ok(),
        })
    }
}

struct RealReadDir {
    inner: tokio::fs::ReadDir,
    exhausted: bool,
}

#[async_trait]
impl ReadDirStream for RealReadDir {
    async fn next_entry(&mut self) -> Result<Option<DirEntry>, String> {
        if self.exhausted {
            return Ok(None);
        }
        match self.inner.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| format!("file_type failed for {:?}: {}", path, e))?;
                Ok(Some(DirEntry {
                    path,
                    is_dir: file_type.is_dir(),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                // The listing itself broke; a retry would likely fail the same way.
                self.exhausted = true;
                Err(format!("next_entry failed: {}", e))
            }
        }
    }
}

/// In-memory filesystem for tests.
///
/// Clones share the same tree, so a test can keep a handle and keep adding
/// files while the scanner holds another. Paths are treated literally;
/// callers should use consistent absolute or relative paths.
#[derive(Default, Clone)]
pub struct InMemoryFs {
    nodes: Arc<RwLock<HashMap<PathBuf, Node>>>,
}

#[derive(Clone)]
enum Node {
    Dir { children: Vec<PathBuf> },
    File { modified: SystemTime },
    /// Listed by its parent, but every stat fails.
    Unreadable,
    /// Fails while its parent is being listed, like an entry removed
    /// between `readdir` and the type lookup.
    Vanished,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir<P: Into<PathBuf>>(&self, path: P) {
        let path = path.into();
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if nodes.contains_key(&path) {
            return;
        }
        ensure_parent_link(&mut nodes, &path);
        nodes.insert(
            path,
            Node::Dir {
                children: Vec::new(),
            },
        );
    }

    /// Add a file, or overwrite an existing one with a new mtime.
    pub fn add_file<P: Into<PathBuf>>(&self, path: P, modified: SystemTime) {
        let path = path.into();
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        ensure_parent_link(&mut nodes, &path);
        nodes.insert(path, Node::File { modified });
    }

    /// Add an entry whose metadata lookups always fail.
    pub fn add_unreadable<P: Into<PathBuf>>(&self, path: P) {
        let path = path.into();
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        ensure_parent_link(&mut nodes, &path);
        nodes.insert(path, Node::Unreadable);
    }

    /// Add an entry that yields an error when its parent is listed.
    pub fn add_vanished<P: Into<PathBuf>>(&self, path: P) {
        let path = path.into();
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        ensure_parent_link(&mut nodes, &path);
        nodes.insert(path, Node::Vanished);
    }
}

fn ensure_parent_link(nodes: &mut HashMap<PathBuf, Node>, path: &Path) {
    if let Some(parent) = path.parent() {
        if parent.as_os_str().is_empty() {
            return;
        }
        // Ensure parent directory exists
        if !nodes.contains_key(parent) {
            nodes.insert(
                parent.to_path_buf(),
                Node::Dir {
                    children: Vec::new(),
                },
            );
            // Recurse to ensure its parent exists
            ensure_parent_link(nodes, parent);
        }
        // Link child into parent
        if let Some(Node::Dir { children }) = nodes.get_mut(parent)
            && !children.iter().any(|p| p.as_path() == path)
        {
            children.push(path.to_path_buf());
        }
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream + Send>, String> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(path) {
            Some(Node::Dir { children }) => {
                let queue = children
                    .iter()
                    .map(|child| match nodes.get(child) {
                        Some(Node::Vanished) => Err(format!("entry vanished: {:?}", child)),
                        other => Ok(DirEntry {
                            path: child.clone(),
                            is_dir: matches!(other, Some(Node::Dir { .. })),
                        }),
                    })
                    .collect();
                Ok(Box::new(InMemReadDir { queue }))
            }
            Some(_) => Err(format!("read_dir on non-directory: {:?}", path)),
            None => Err(format!("read_dir on missing path: {:?}", path)),
        }
    }

    async fn metadata(&self, path: &Path) -> Result<FsMetadata, String> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(path) {
            Some(Node::Dir { .. }) => Ok(FsMetadata {
                is_file: false,
                modified: None,
            }),
            Some(Node::File { modified }) => Ok(FsMetadata {
                is_file: true,
                modified: Some(*modified),
            }),
            Some(Node::Unreadable) => Err(format!("metadata denied for {:?}", path)),
            Some(Node::Vanished) | None => Err(format!("metadata on missing path: {:?}", path)),
        }
    }
}

struct InMemReadDir {
    queue: VecDeque<Result<DirEntry, String>>,
}

#[async_trait]
impl ReadDirStream for InMemReadDir {
    async fn next_entry(&mut self) -> Result<Option<DirEntry>, String> {
        self.queue.pop_front().transpose()
    }
}
