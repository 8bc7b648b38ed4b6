//! Catalog store contract
//!
//! The scanning engine consumes, but does not own, a persistent catalog.
//! Implementations must honour two invariants on every write:
//! an item's `media_kind` equals its folder's kind, and `file_path` is
//! unique across the whole catalog.

use crate::error::Result;
use crate::types::{FolderId, LibraryFolder, MediaItem, MediaItemId, MetadataRecord, UpsertMediaItem};
use async_trait::async_trait;

/// Read/write access to folders, items, and metadata records
///
/// The scan reconciler is the only writer the engine uses; it serializes
/// writes per path, so implementations may assume single-writer semantics
/// for any given `file_path`.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // ========================================================================
    // Folders
    // ========================================================================

    /// Get a folder by ID
    async fn get_folder(&self, id: FolderId) -> Result<Option<LibraryFolder>>;

    /// All enabled folders
    async fn list_enabled_folders(&self) -> Result<Vec<LibraryFolder>>;

    // ========================================================================
    // Items
    // ========================================================================

    /// Look up the item cataloged at an exact canonical path
    async fn get_item_by_path(&self, path: &str) -> Result<Option<MediaItem>>;

    /// Insert or update the item at `item.file_path` and replace its metadata
    /// record with `metadata` (`None` clears any existing record).
    ///
    /// Fails with `KindMismatch` when the item's kind differs from its folder's,
    /// and with `Duplicate` when the path is already owned by another folder.
    async fn upsert_item(
        &self,
        item: UpsertMediaItem,
        metadata: Option<MetadataRecord>,
    ) -> Result<MediaItem>;

    /// Hard-delete an item, cascading its metadata record
    async fn delete_item(&self, id: MediaItemId) -> Result<()>;

    /// All items owned by a folder (used by removal detection)
    async fn list_items(&self, folder_id: FolderId) -> Result<Vec<MediaItem>>;

    /// The metadata record attached to an item, if extraction has succeeded
    async fn get_metadata(&self, item_id: MediaItemId) -> Result<Option<MetadataRecord>>;
}
