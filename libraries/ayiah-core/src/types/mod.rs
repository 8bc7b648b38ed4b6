mod library_folder;
mod media_item;
mod media_kind;
mod metadata;
mod scan_outcome;

pub use library_folder::{CreateLibraryFolder, FolderId, LibraryFolder, UpdateLibraryFolder};
pub use media_item::{MediaItem, MediaItemId, UpsertMediaItem};
pub use media_kind::MediaKind;
pub use metadata::{BookMetadata, ComicMetadata, MetadataRecord, VideoMetadata};
pub use scan_outcome::{IssueKind, ScanIssue, ScanOutcome};
