//! Metadata extraction capability and the standard per-kind dispatcher

use crate::classifier::{Classified, ContainerFormat};
use crate::error::{MetadataError, Result};
use crate::{book, comic, video};
use ayiah_core::types::{MediaKind, MetadataRecord};
use std::path::Path;

/// Result of one extraction attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// Descriptive fields were found
    Extracted(MetadataRecord),

    /// Structurally valid file with nothing descriptive in it
    NoMetadata,

    /// File could not be parsed (corrupt, truncated, wrong container)
    Failed { reason: String },
}

impl ExtractionOutcome {
    pub fn record(&self) -> Option<&MetadataRecord> {
        match self {
            Self::Extracted(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<MetadataRecord> {
        match self {
            Self::Extracted(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// `Extracted` unless the record carries nothing descriptive
    pub(crate) fn from_record(record: MetadataRecord) -> Self {
        if record.is_empty() {
            Self::NoMetadata
        } else {
            Self::Extracted(record)
        }
    }
}

/// Capability: given a classified file, attempt to produce descriptive metadata
///
/// Implementations are blocking and must not touch the catalog. Transient
/// I/O problems come back as `Err` so callers can retry; anything wrong with
/// the file itself is `Ok(ExtractionOutcome::Failed)`.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path, target: Classified) -> Result<ExtractionOutcome>;
}

/// Built-in strategies: video containers, comic archives, e-books/documents
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardExtractor;

impl StandardExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataExtractor for StandardExtractor {
    fn extract(&self, path: &Path, target: Classified) -> Result<ExtractionOutcome> {
        let attempt = match target.kind {
            MediaKind::Movie | MediaKind::Tv => video::extract(path, target.format),
            MediaKind::Comic => comic::extract(path, target.format),
            MediaKind::Book => book::extract(path, target.format),
        };

        match attempt {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_transient() => Err(err),
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    format = %target.format,
                    error = %err,
                    "Extraction failed"
                );
                Ok(ExtractionOutcome::Failed {
                    reason: err.to_string(),
                })
            }
        }
    }
}

/// Check that a file starts with the signature `format` promises
///
/// Used for containers we catalog without parsing.
pub(crate) fn verify_signature(path: &Path, format: ContainerFormat) -> Result<ExtractionOutcome> {
    use std::io::Read;

    let mut prefix = Vec::with_capacity(crate::classifier::MIN_SNIFF_LEN);
    std::fs::File::open(path)?
        .take(crate::classifier::MIN_SNIFF_LEN as u64)
        .read_to_end(&mut prefix)?;

    match crate::classifier::sniff(&prefix) {
        Some(sniffed) if sniffed == format => Ok(ExtractionOutcome::NoMetadata),
        Some(sniffed) => Err(MetadataError::malformed(
            format.name(),
            format!("content is {sniffed}"),
        )),
        None => Err(MetadataError::malformed(format.name(), "unrecognised signature")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ayiah_core::types::VideoMetadata;
    use std::io::Write;

    #[test]
    fn empty_records_become_no_metadata() {
        let empty = MetadataRecord::Video(VideoMetadata::default());
        assert_eq!(ExtractionOutcome::from_record(empty), ExtractionOutcome::NoMetadata);

        let titled = MetadataRecord::Video(VideoMetadata {
            title: Some("Heat".to_string()),
            ..Default::default()
        });
        assert!(ExtractionOutcome::from_record(titled).record().is_some());
    }

    #[test]
    fn corrupt_file_is_failed_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.mkv");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"this is not a matroska file")
            .unwrap();

        let outcome = StandardExtractor::new()
            .extract(
                &path,
                Classified {
                    kind: MediaKind::Movie,
                    format: ContainerFormat::Matroska,
                },
            )
            .unwrap();
        assert!(outcome.is_failed());
    }

    #[test]
    fn missing_file_is_transient_error() {
        let result = StandardExtractor::new().extract(
            Path::new("/definitely/not/here.epub"),
            Classified {
                kind: MediaKind::Book,
                format: ContainerFormat::Epub,
            },
        );
        assert!(matches!(result, Err(MetadataError::Io(_))));
    }

    #[test]
    fn unparsed_archives_only_need_a_valid_signature() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("issue.cbr");
        std::fs::write(&good, b"Rar!\x1A\x07\x00rest of archive").unwrap();
        let bad = dir.path().join("fake.cbr");
        std::fs::write(&bad, b"not a rar").unwrap();

        let target = Classified {
            kind: MediaKind::Comic,
            format: ContainerFormat::Rar,
        };
        let extractor = StandardExtractor::new();
        assert_eq!(extractor.extract(&good, target).unwrap(), ExtractionOutcome::NoMetadata);
        assert!(extractor.extract(&bad, target).unwrap().is_failed());
    }
}
