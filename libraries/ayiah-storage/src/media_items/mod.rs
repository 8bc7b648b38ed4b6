//! Media item storage
//!
//! Items are keyed by their canonical `file_path`, which is unique across the
//! whole catalog. Writes go through [`upsert`], which checks the owning
//! folder's kind and replaces the item's metadata record in one transaction.

use crate::error::{Result, StorageError};
use crate::media_metadata;
use ayiah_core::types::{
    FolderId, MediaItem, MediaItemId, MediaKind, MetadataRecord, UpsertMediaItem,
};
use sqlx::SqlitePool;

const SELECT_ITEM: &str = r#"
    SELECT id, library_folder_id, media_kind, title, file_path, file_size,
           file_mtime, fingerprint, added_at, updated_at
    FROM media_items
"#;

/// Get a media item by ID
pub async fn get_by_id(pool: &SqlitePool, id: MediaItemId) -> Result<Option<MediaItem>> {
    let item = sqlx::query_as::<_, MediaItem>(&format!("{SELECT_ITEM} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(item)
}

/// Get the media item cataloged at a path
pub async fn get_by_path(pool: &SqlitePool, path: &str) -> Result<Option<MediaItem>> {
    let item = sqlx::query_as::<_, MediaItem>(&format!("{SELECT_ITEM} WHERE file_path = ?"))
        .bind(path)
        .fetch_optional(pool)
        .await?;

    Ok(item)
}

/// Get all media items owned by a folder
pub async fn get_by_folder(pool: &SqlitePool, folder_id: FolderId) -> Result<Vec<MediaItem>> {
    let items = sqlx::query_as::<_, MediaItem>(&format!(
        "{SELECT_ITEM} WHERE library_folder_id = ? ORDER BY file_path"
    ))
    .bind(folder_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

/// Count the items owned by a folder
pub async fn count_by_folder(pool: &SqlitePool, folder_id: FolderId) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media_items WHERE library_folder_id = ?")
        .bind(folder_id)
        .fetch_one(pool)
        .await?;

    Ok(count.0)
}

/// Insert or update an item and replace its metadata record
///
/// - the owning folder must exist and have the item's kind (`KindMismatch`)
/// - a path already owned by another folder is rejected (`Duplicate`)
/// - `metadata: None` clears any previous record
pub async fn upsert(
    pool: &SqlitePool,
    item: &UpsertMediaItem,
    metadata: Option<&MetadataRecord>,
) -> Result<MediaItem> {
    if let Some(record) = metadata {
        if !record.matches_kind(item.media_kind) {
            return Err(StorageError::InvalidInput(format!(
                "metadata record does not fit a {} item",
                item.media_kind
            )));
        }
    }

    let mut tx = pool.begin().await?;

    let folder_kind: Option<(MediaKind,)> =
        sqlx::query_as("SELECT media_kind FROM library_folders WHERE id = ?")
            .bind(item.library_folder_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some((folder_kind,)) = folder_kind else {
        return Err(StorageError::not_found(
            "library folder",
            item.library_folder_id.to_string(),
        ));
    };

    if folder_kind != item.media_kind {
        return Err(StorageError::KindMismatch {
            folder: folder_kind,
            item: item.media_kind,
        });
    }

    let now = chrono::Utc::now();

    // The WHERE on the conflict branch leaves rows of other folders untouched,
    // in which case RETURNING yields nothing.
    let stored = sqlx::query_as::<_, MediaItem>(
        r#"
        INSERT INTO media_items (
            library_folder_id, media_kind, title, file_path, file_size,
            file_mtime, fingerprint, added_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(file_path) DO UPDATE SET
            title = excluded.title,
            file_size = excluded.file_size,
            file_mtime = excluded.file_mtime,
            fingerprint = excluded.fingerprint,
            updated_at = excluded.updated_at
        WHERE media_items.library_folder_id = excluded.library_folder_id
        RETURNING id, library_folder_id, media_kind, title, file_path, file_size,
                  file_mtime, fingerprint, added_at, updated_at
        "#,
    )
    .bind(item.library_folder_id)
    .bind(item.media_kind)
    .bind(&item.title)
    .bind(&item.file_path)
    .bind(item.file_size)
    .bind(item.file_mtime)
    .bind(&item.fingerprint)
    .bind(now)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| StorageError::Duplicate(item.file_path.clone()))?;

    match metadata {
        Some(record) => media_metadata::upsert(&mut *tx, stored.id, stored.media_kind, record).await?,
        None => media_metadata::delete(&mut *tx, stored.id).await?,
    }

    tx.commit().await?;

    Ok(stored)
}

/// Delete a media item (its metadata record cascades)
///
/// Returns `false` if the item did not exist.
pub async fn delete(pool: &SqlitePool, id: MediaItemId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM media_items WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
