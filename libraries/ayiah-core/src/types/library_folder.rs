//! Library folder types
//!
//! A library folder is a configured root that the scanner walks. Its media
//! kind is fixed at creation time; disabling a folder keeps its catalog
//! entries but excludes it from scans and watches.

use super::MediaKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub type FolderId = i64;

/// A configured library root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct LibraryFolder {
    /// Unique ID
    pub id: FolderId,

    /// Display name (e.g., "Movies", "Manga")
    pub name: String,

    /// Absolute path to the folder root, unique across all folders
    pub path: String,

    /// Kind of media this folder holds (never changes after creation)
    pub media_kind: MediaKind,

    /// Whether this folder is included in scans and watches
    pub enabled: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl LibraryFolder {
    /// The folder root as a path
    pub fn root(&self) -> &Path {
        Path::new(&self.path)
    }
}

/// Request to create a new library folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLibraryFolder {
    /// Display name
    pub name: String,

    /// Absolute path to the folder root
    pub path: String,

    /// Kind of media this folder holds
    pub media_kind: MediaKind,
}

/// Request to update a library folder
///
/// The media kind is deliberately absent: it cannot change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLibraryFolder {
    /// Display name
    pub name: Option<String>,

    /// Whether this folder is enabled
    pub enabled: Option<bool>,
}
