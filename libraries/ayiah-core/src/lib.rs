//! Ayiah Core
//!
//! Platform-agnostic domain types, the catalog contract, and error handling
//! shared by the library scanning engine.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `LibraryFolder`, `MediaItem`, `MediaKind`, `MetadataRecord`, `ScanOutcome`
//! - **Catalog Contract**: the `CatalogStore` trait the scanner reads and writes through
//! - **Error Handling**: Unified `AyiahError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use ayiah_core::types::{MediaKind, ScanOutcome};
//!
//! let kind: MediaKind = "movie".parse().unwrap();
//! assert!(kind.is_video());
//!
//! let mut outcome = ScanOutcome::new(1);
//! outcome.added += 2;
//! outcome.skipped += 1;
//! assert_eq!(outcome.total(), 3);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use catalog::CatalogStore;
pub use error::{AyiahError, Result};

pub use types::{
    // Folders and items
    FolderId, LibraryFolder, MediaItem, MediaItemId, MediaKind, UpsertMediaItem,
    // Metadata records
    BookMetadata, ComicMetadata, MetadataRecord, VideoMetadata,
    // Scan results
    IssueKind, ScanIssue, ScanOutcome,
};
