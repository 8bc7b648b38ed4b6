//! Cataloged media files

use super::{FolderId, MediaKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MediaItemId = i64;

/// One cataloged file
///
/// `media_kind` always equals the owning folder's kind and `file_path` is
/// unique across the whole catalog, not just within a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct MediaItem {
    pub id: MediaItemId,
    pub library_folder_id: FolderId,
    pub media_kind: MediaKind,

    /// Title derived from the filename or from extracted metadata
    pub title: String,

    /// Canonical (symlink-resolved) absolute path
    pub file_path: String,

    /// File size in bytes
    pub file_size: i64,

    /// Modification time (Unix epoch milliseconds)
    pub file_mtime: i64,

    /// Content fingerprint the metadata was computed from
    pub fingerprint: Option<String>,

    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    /// Whether the stored size and modification signal match an observed file
    pub fn is_unchanged(&self, file_size: i64, file_mtime: i64) -> bool {
        self.file_size == file_size && self.file_mtime == file_mtime
    }
}

/// Insert-or-update request for a media item, keyed by `file_path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertMediaItem {
    pub library_folder_id: FolderId,
    pub media_kind: MediaKind,
    pub title: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_mtime: i64,
    pub fingerprint: Option<String>,
}
