/// Core error types for Ayiah
use crate::types::{FolderId, MediaItemId, MediaKind};
use thiserror::Error;

/// Result type alias using `AyiahError`
pub type Result<T> = std::result::Result<T, AyiahError>;

/// Core error type for Ayiah
///
/// This is also the error type of the [`CatalogStore`](crate::CatalogStore)
/// contract, so storage implementations convert their own errors into it.
#[derive(Error, Debug)]
pub enum AyiahError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Library folder not found
    #[error("Library folder not found: {0}")]
    FolderNotFound(FolderId),

    /// Media item not found
    #[error("Media item not found: {0}")]
    MediaItemNotFound(MediaItemId),

    /// A media item's kind does not match its owning folder
    #[error("Media kind mismatch: folder is {folder}, item is {item}")]
    KindMismatch { folder: MediaKind, item: MediaKind },

    /// Duplicate entry (path already claimed)
    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Database errors (for storage implementations)
    #[error("Database error: {0}")]
    Database(String),
}

impl AyiahError {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[cfg(feature = "sqlx-support")]
impl From<sqlx::Error> for AyiahError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}
