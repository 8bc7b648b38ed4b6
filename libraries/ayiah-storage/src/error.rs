/// Storage-specific errors
use ayiah_core::types::MediaKind;
use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint hit (folder path or item path already claimed)
    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    /// Item kind does not match its folder
    #[error("Media kind mismatch: folder is {folder}, item is {item}")]
    KindMismatch { folder: MediaKind, item: MediaKind },

    /// Request rejected before touching the database
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error from `SQLx`
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Map unique-constraint violations to `Duplicate`, pass everything else through
    pub(crate) fn from_write(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate(what.into()),
            _ => Self::Database(err),
        }
    }
}

impl From<StorageError> for ayiah_core::AyiahError {
    fn from(err: StorageError) -> Self {
        use ayiah_core::AyiahError;
        match err {
            StorageError::NotFound { entity, id } => AyiahError::NotFound { entity, id },
            StorageError::Duplicate(what) => AyiahError::Duplicate(what),
            StorageError::KindMismatch { folder, item } => AyiahError::KindMismatch { folder, item },
            StorageError::InvalidInput(msg) => AyiahError::InvalidInput(msg),
            StorageError::Serialization(e) => AyiahError::Serialization(e),
            other => AyiahError::storage(other.to_string()),
        }
    }
}
