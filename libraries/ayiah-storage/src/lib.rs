//! Ayiah Storage
//!
//! `SQLite` catalog for the library scanning engine.
//!
//! This crate provides persistent storage for library folders, media items,
//! and their metadata records, and implements the
//! [`CatalogStore`](ayiah_core::CatalogStore) contract on top of it.
//!
//! # Architecture
//!
//! - **Vertical Slicing**: Each table owns its own queries (`library_folders`,
//!   `media_items`, `media_metadata`)
//! - **Cascading ownership**: folders own items, items own their metadata record
//! - **Catalog-wide path uniqueness**: enforced by a `UNIQUE` constraint
//!
//! # Example
//!
//! ```rust,no_run
//! use ayiah_storage::{SqliteCatalog, create_pool, run_migrations};
//! use ayiah_core::CatalogStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool("sqlite://ayiah.db").await?;
//! run_migrations(&pool).await?;
//!
//! let catalog = SqliteCatalog::new(pool);
//! let folders = catalog.list_enabled_folders().await?;
//! # Ok(())
//! # }
//! ```

mod context;
mod error;

// Vertical slices
pub mod library_folders;
pub mod media_items;
pub mod media_metadata;

pub use context::SqliteCatalog;
pub use error::StorageError;

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;

// Embed migrations into binary
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
///
/// This should be called once when the application starts to ensure
/// the database schema is up to date.
///
/// # Errors
///
/// Returns an error if migrations fail to run
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StorageError> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Create a new `SQLite` pool
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (e.g., `<sqlite://ayiah.db>`)
///
/// # Errors
///
/// Returns an error if the connection fails
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, StorageError> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    tracing::debug!(database_url, "Creating SQLite pool");

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true) // Cascading deletes depend on this
        .journal_mode(SqliteJournalMode::Wal) // Use WAL mode for better concurrency
        .busy_timeout(std::time::Duration::from_secs(30)); // Wait up to 30s for locks

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
