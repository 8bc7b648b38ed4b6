/// Metadata-specific errors
use thiserror::Error;

/// Result type alias using `MetadataError`
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Metadata error types
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Format the extractor has no strategy for
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Structure could not be parsed (corrupt, truncated, wrong container)
    #[error("Malformed {format}: {reason}")]
    Malformed {
        format: &'static str,
        reason: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Zip archive error (CBZ, EPUB)
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl MetadataError {
    pub(crate) fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            reason: reason.into(),
        }
    }

    /// Whether retrying later may succeed
    ///
    /// Short reads and invalid data say something about the file, not the
    /// environment, so they are definitive like any parse failure.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(e) => is_transient_io(e),
            Self::Zip(zip::result::ZipError::Io(e)) => is_transient_io(e),
            _ => false,
        }
    }
}

fn is_transient_io(err: &std::io::Error) -> bool {
    !matches!(
        err.kind(),
        std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData
    )
}

impl From<MetadataError> for ayiah_core::AyiahError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::Io(e) => ayiah_core::AyiahError::Io(e),
            other => ayiah_core::AyiahError::invalid_input(other.to_string()),
        }
    }
}
