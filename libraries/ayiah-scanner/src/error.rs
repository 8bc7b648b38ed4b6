//! Error types for the scanner

use ayiah_core::types::FolderId;
use thiserror::Error;

/// Result type alias using `ScanError`
pub type Result<T> = std::result::Result<T, ScanError>;

/// Scan and watch failures
///
/// Unrecognised files and failed extractions are not errors; they are
/// counted in the `ScanOutcome`. Errors are cloneable so one in-flight scan
/// can hand the same result to every caller attached to it.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// Unknown folder id (caller misuse)
    #[error("Library folder not found: {0}")]
    FolderNotFound(FolderId),

    /// Folder exists but is disabled
    #[error("Library folder {0} is disabled")]
    FolderDisabled(FolderId),

    /// Folder root no longer exists on disk
    #[error("Library folder {folder_id} root is missing: {path}")]
    FolderMissing { folder_id: FolderId, path: String },

    /// A subtree could not be walked
    #[error("Failed to walk {path}: {message}")]
    Walk { path: String, message: String },

    /// Catalog read or write rejected
    #[error("Catalog error: {0}")]
    Store(String),

    /// Filesystem subscription could not be created or was lost
    #[error("Watch error for folder {folder_id}: {message}")]
    Watch { folder_id: FolderId, message: String },

    #[error("IO error: {0}")]
    Io(String),

    /// The scan task ended without producing an outcome
    #[error("Scan aborted: {0}")]
    Aborted(String),
}

impl ScanError {
    pub(crate) fn watch(folder_id: FolderId, message: impl ToString) -> Self {
        Self::Watch {
            folder_id,
            message: message.to_string(),
        }
    }
}

impl From<ayiah_core::AyiahError> for ScanError {
    fn from(err: ayiah_core::AyiahError) -> Self {
        match err {
            ayiah_core::AyiahError::FolderNotFound(id) => Self::FolderNotFound(id),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ScanError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Aborted(err.to_string())
    }
}
