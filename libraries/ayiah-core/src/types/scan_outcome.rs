//! Per-scan outcome counts
//!
//! Not persisted: this is the contract returned to scan callers.

use super::FolderId;
use serde::{Deserialize, Serialize};

/// Aggregate counts for one scan of one folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Folder the counts were computed for
    pub folder_id: FolderId,

    /// New files cataloged (with or without metadata)
    pub added: u64,

    /// Changed files whose metadata was re-extracted
    pub updated: u64,

    /// Unchanged, unrecognized, or duplicate paths
    pub skipped: u64,

    /// Paths that could not be walked, read, or written
    pub errored: u64,

    /// Catalog items whose file disappeared
    pub removed: u64,

    /// Set when the scan was cancelled before every file was processed
    pub partial: bool,

    /// Per-path warnings and errors, in no particular order
    #[serde(default)]
    pub issues: Vec<ScanIssue>,
}

impl ScanOutcome {
    pub fn new(folder_id: FolderId) -> Self {
        Self {
            folder_id,
            ..Default::default()
        }
    }

    /// Number of distinct paths this outcome accounts for
    pub fn total(&self) -> u64 {
        self.added + self.updated + self.skipped + self.errored + self.removed
    }

    /// True when the scan changed nothing in the catalog
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }

    /// Counter merge; commutative in every count
    pub fn merge(&mut self, other: ScanOutcome) {
        self.added += other.added;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.errored += other.errored;
        self.removed += other.removed;
        self.partial |= other.partial;
        self.issues.extend(other.issues);
    }

    /// Record a per-path issue without touching the counts
    pub fn push_issue(&mut self, path: impl Into<String>, kind: IssueKind, message: impl Into<String>) {
        self.issues.push(ScanIssue {
            path: path.into(),
            kind,
            message: message.into(),
        });
    }
}

/// A per-path warning or error recorded during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanIssue {
    pub path: String,
    pub kind: IssueKind,
    pub message: String,
}

/// What went wrong for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// File cataloged without metadata (warning, counted as added/updated)
    ExtractionFailed,
    /// Catalog write rejected (counted as errored)
    StoreFailed,
    /// Subtree could not be walked (counted as errored)
    WalkFailed,
    /// File could not be read for classification (counted as errored)
    ReadFailed,
}
