//! Folder walking
//!
//! Enumerates candidate files under a folder root. Symbolic links are
//! followed only while their target stays inside the root; link cycles are
//! dropped quietly by `walkdir`'s loop detection.

use crate::config::ScannerConfig;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// One item produced by a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEntry {
    /// A file eligible for reconciliation
    File { path: PathBuf, size: u64 },

    /// A path that could not be read; the walk continues elsewhere
    Failed { path: PathBuf, message: String },
}

/// Walker for one folder root
#[derive(Debug, Clone)]
pub struct FolderWalker {
    root: PathBuf,
    ignore: Vec<String>,
    min_file_size: u64,
}

impl FolderWalker {
    /// Create a walker for `root`
    ///
    /// The root is canonicalized when possible so that escape checks compare
    /// like with like.
    pub fn new(root: impl AsRef<Path>, config: &ScannerConfig) -> Self {
        let root = root.as_ref();
        Self {
            root: std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()),
            ignore: config.ignore.clone(),
            min_file_size: config.min_file_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn min_file_size(&self) -> u64 {
        self.min_file_size
    }

    /// Lazily walk the root
    ///
    /// Each call starts a fresh traversal, so the sequence is restartable.
    pub fn walk(&self) -> impl Iterator<Item = WalkEntry> + '_ {
        WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || self.keep(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => self.candidate(&entry),
                Err(err) => {
                    if err.loop_ancestor().is_some() {
                        tracing::debug!(error = %err, "Skipping symlink cycle");
                        return None;
                    }
                    let path = err
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    tracing::warn!(path = %path.display(), error = %err, "Failed to walk path");
                    Some(WalkEntry::Failed {
                        path,
                        message: err.to_string(),
                    })
                }
            })
    }

    /// Whether `path` is hidden, ignored, or outside the root
    ///
    /// Only the path's components are inspected; the file need not exist.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return true;
        };
        relative.components().any(|component| match component {
            Component::Normal(name) => self.is_hidden_or_ignored(&name.to_string_lossy()),
            _ => true,
        })
    }

    fn is_hidden_or_ignored(&self, name: &str) -> bool {
        name.starts_with('.') || self.ignore.iter().any(|ignored| ignored == name)
    }

    /// Prune hidden and ignored entries, and links escaping the root
    fn keep(&self, entry: &DirEntry) -> bool {
        if self.is_hidden_or_ignored(&entry.file_name().to_string_lossy()) {
            return false;
        }
        if entry.path_is_symlink() {
            return match std::fs::canonicalize(entry.path()) {
                Ok(target) if target.starts_with(&self.root) => true,
                Ok(target) => {
                    tracing::debug!(
                        link = %entry.path().display(),
                        target = %target.display(),
                        "Skipping symlink escaping the folder root"
                    );
                    false
                }
                // Dangling link
                Err(_) => false,
            };
        }
        true
    }

    fn candidate(&self, entry: &DirEntry) -> Option<WalkEntry> {
        if !entry.file_type().is_file() {
            return None;
        }
        match entry.metadata() {
            Ok(meta) if meta.len() < self.min_file_size => None,
            Ok(meta) => Some(WalkEntry::File {
                path: entry.path().to_path_buf(),
                size: meta.len(),
            }),
            Err(err) => Some(WalkEntry::Failed {
                path: entry.path().to_path_buf(),
                message: err.to_string(),
            }),
        }
    }
}
