//! Library folder storage (configured roots)
//!
//! # Example
//!
//! ```rust,no_run
//! use ayiah_storage::library_folders;
//! use ayiah_core::types::{CreateLibraryFolder, MediaKind};
//!
//! # async fn example(pool: &sqlx::SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
//! let folder = library_folders::create(pool, &CreateLibraryFolder {
//!     name: "Movies".to_string(),
//!     path: "/srv/media/movies".to_string(),
//!     media_kind: MediaKind::Movie,
//! }).await?;
//!
//! let enabled = library_folders::get_enabled(pool).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, StorageError};
use ayiah_core::types::{CreateLibraryFolder, FolderId, LibraryFolder, UpdateLibraryFolder};
use sqlx::SqlitePool;

const SELECT_FOLDER: &str = r#"
    SELECT id, name, path, media_kind, enabled, created_at, updated_at
    FROM library_folders
"#;

/// Get a library folder by ID
pub async fn get_by_id(pool: &SqlitePool, id: FolderId) -> Result<Option<LibraryFolder>> {
    let folder = sqlx::query_as::<_, LibraryFolder>(&format!("{SELECT_FOLDER} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(folder)
}

/// Get all library folders
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<LibraryFolder>> {
    let folders = sqlx::query_as::<_, LibraryFolder>(&format!("{SELECT_FOLDER} ORDER BY name"))
        .fetch_all(pool)
        .await?;

    Ok(folders)
}

/// Get only enabled library folders
pub async fn get_enabled(pool: &SqlitePool) -> Result<Vec<LibraryFolder>> {
    let folders = sqlx::query_as::<_, LibraryFolder>(&format!(
        "{SELECT_FOLDER} WHERE enabled = 1 ORDER BY created_at, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(folders)
}

/// Create a new library folder
///
/// Fails with `Duplicate` if another folder already uses the same path.
pub async fn create(pool: &SqlitePool, folder: &CreateLibraryFolder) -> Result<LibraryFolder> {
    let now = chrono::Utc::now();

    let created = sqlx::query_as::<_, LibraryFolder>(
        r#"
        INSERT INTO library_folders (name, path, media_kind, enabled, created_at, updated_at)
        VALUES (?, ?, ?, 1, ?, ?)
        RETURNING id, name, path, media_kind, enabled, created_at, updated_at
        "#,
    )
    .bind(&folder.name)
    .bind(&folder.path)
    .bind(folder.media_kind)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| StorageError::from_write(e, folder.path.clone()))?;

    tracing::debug!(id = created.id, path = %created.path, kind = %created.media_kind, "Created library folder");
    Ok(created)
}

/// Update a library folder's name and/or enabled flag
///
/// Returns `false` if the folder does not exist.
pub async fn update(pool: &SqlitePool, id: FolderId, update: &UpdateLibraryFolder) -> Result<bool> {
    let Some(current) = get_by_id(pool, id).await? else {
        return Ok(false);
    };

    let name = update.name.as_ref().unwrap_or(&current.name);
    let enabled = update.enabled.unwrap_or(current.enabled);

    let result = sqlx::query(
        r#"
        UPDATE library_folders
        SET name = ?, enabled = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(name)
    .bind(enabled)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Enable or disable a folder; catalog entries are kept either way
pub async fn set_enabled(pool: &SqlitePool, id: FolderId, enabled: bool) -> Result<bool> {
    update(
        pool,
        id,
        &UpdateLibraryFolder {
            name: None,
            enabled: Some(enabled),
        },
    )
    .await
}

/// Delete a library folder, cascading its items and their metadata
///
/// Returns `false` if the folder does not exist.
pub async fn delete(pool: &SqlitePool, id: FolderId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM library_folders WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
