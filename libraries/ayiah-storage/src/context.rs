use crate::{library_folders, media_items, media_metadata};
use async_trait::async_trait;
use ayiah_core::{
    catalog::CatalogStore,
    error::Result,
    types::{FolderId, LibraryFolder, MediaItem, MediaItemId, MetadataRecord, UpsertMediaItem},
};
use sqlx::SqlitePool;

/// `SQLite`-backed catalog
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    // Folders
    async fn get_folder(&self, id: FolderId) -> Result<Option<LibraryFolder>> {
        Ok(library_folders::get_by_id(&self.pool, id).await?)
    }

    async fn list_enabled_folders(&self) -> Result<Vec<LibraryFolder>> {
        Ok(library_folders::get_enabled(&self.pool).await?)
    }

    // Items
    async fn get_item_by_path(&self, path: &str) -> Result<Option<MediaItem>> {
        Ok(media_items::get_by_path(&self.pool, path).await?)
    }

    async fn upsert_item(
        &self,
        item: UpsertMediaItem,
        metadata: Option<MetadataRecord>,
    ) -> Result<MediaItem> {
        Ok(media_items::upsert(&self.pool, &item, metadata.as_ref()).await?)
    }

    async fn delete_item(&self, id: MediaItemId) -> Result<()> {
        media_items::delete(&self.pool, id).await?;
        Ok(())
    }

    async fn list_items(&self, folder_id: FolderId) -> Result<Vec<MediaItem>> {
        Ok(media_items::get_by_folder(&self.pool, folder_id).await?)
    }

    // Metadata
    async fn get_metadata(&self, item_id: MediaItemId) -> Result<Option<MetadataRecord>> {
        Ok(media_metadata::get(&self.pool, item_id).await?)
    }
}
