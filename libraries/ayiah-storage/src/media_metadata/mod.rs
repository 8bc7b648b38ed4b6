//! Metadata record storage
//!
//! Records are stored as their tagged JSON form, one row per media item.
//! Deleting the owning item cascades the row.

use crate::error::Result;
use ayiah_core::types::{MediaItemId, MediaKind, MetadataRecord};
use sqlx::{SqliteConnection, SqlitePool};

#[derive(sqlx::FromRow)]
struct MetadataRow {
    payload: String,
}

/// Get the metadata record for a media item
pub async fn get(pool: &SqlitePool, media_item_id: MediaItemId) -> Result<Option<MetadataRecord>> {
    let row = sqlx::query_as::<_, MetadataRow>(
        "SELECT payload FROM media_metadata WHERE media_item_id = ?",
    )
    .bind(media_item_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| serde_json::from_str(&r.payload).map_err(Into::into))
        .transpose()
}

/// Insert or replace the record for a media item
pub async fn upsert(
    conn: &mut SqliteConnection,
    media_item_id: MediaItemId,
    media_kind: MediaKind,
    record: &MetadataRecord,
) -> Result<()> {
    let now = chrono::Utc::now();
    let payload = serde_json::to_string(record)?;

    sqlx::query(
        r#"
        INSERT INTO media_metadata (media_item_id, media_kind, title, payload, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(media_item_id) DO UPDATE SET
            media_kind = excluded.media_kind,
            title = excluded.title,
            payload = excluded.payload,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(media_item_id)
    .bind(media_kind)
    .bind(record.title())
    .bind(payload)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Remove the record for a media item, if any
pub async fn delete(conn: &mut SqliteConnection, media_item_id: MediaItemId) -> Result<()> {
    sqlx::query("DELETE FROM media_metadata WHERE media_item_id = ?")
        .bind(media_item_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
