//! Test helpers and fixtures for storage integration tests
//!
//! Databases are real SQLite files in a temp dir (NOT in-memory) so that
//! migrations, foreign keys and unique constraints behave as in production.

#![allow(dead_code)]

use ayiah_core::types::{
    CreateLibraryFolder, FolderId, LibraryFolder, MediaKind, UpsertMediaItem,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Test database wrapper that cleans up on drop
pub struct TestDb {
    pub pool: SqlitePool,
    _temp_dir: TempDir,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let db_url = format!("sqlite://{}", db_path.display());

        let pool = ayiah_storage::create_pool(&db_url)
            .await
            .expect("Failed to create pool");

        ayiah_storage::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        Self {
            pool,
            _temp_dir: temp_dir,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Test fixture: create a folder
pub async fn create_folder(pool: &SqlitePool, path: &str, kind: MediaKind) -> LibraryFolder {
    ayiah_storage::library_folders::create(
        pool,
        &CreateLibraryFolder {
            name: format!("{kind} library"),
            path: path.to_string(),
            media_kind: kind,
        },
    )
    .await
    .expect("Failed to create test folder")
}

/// Test fixture: an item payload under `folder_id`
pub fn item(folder_id: FolderId, kind: MediaKind, path: &str) -> UpsertMediaItem {
    UpsertMediaItem {
        library_folder_id: folder_id,
        media_kind: kind,
        title: "Untitled".to_string(),
        file_path: path.to_string(),
        file_size: 1024,
        file_mtime: 1_700_000_000,
        fingerprint: None,
    }
}
