//! Content classifier
//!
//! Decides what a file is from a bounded prefix of its bytes, falling back to
//! the extension table. A signature match always beats the extension.

use ayiah_core::types::MediaKind;
use std::fmt;
use std::path::Path;

/// Bytes needed to see every signature we sniff (tar's `ustar` sits at 257)
pub const MIN_SNIFF_LEN: usize = 512;

/// Container family of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// ISO base media (MP4, M4V, MOV)
    Mp4,
    /// Matroska / WebM
    Matroska,
    /// RIFF AVI
    Avi,
    /// Recognised video container without a header parser (FLV, ASF, MPEG-PS/TS)
    OtherVideo,
    /// Zip archive (CBZ)
    Zip,
    /// RAR archive (CBR)
    Rar,
    /// 7-Zip archive (CB7)
    SevenZip,
    /// POSIX tar (CBT)
    Tar,
    Pdf,
    Epub,
    /// PalmDB `BOOKMOBI` (MOBI, AZW3)
    Mobi,
}

impl ContainerFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::Mp4 => "MP4",
            Self::Matroska => "Matroska",
            Self::Avi => "AVI",
            Self::OtherVideo => "video",
            Self::Zip => "ZIP",
            Self::Rar => "RAR",
            Self::SevenZip => "7z",
            Self::Tar => "tar",
            Self::Pdf => "PDF",
            Self::Epub => "EPUB",
            Self::Mobi => "MOBI",
        }
    }

    /// Whether files of this format belong in a folder of `kind`
    pub fn fits(self, kind: MediaKind) -> bool {
        match self {
            Self::Mp4 | Self::Matroska | Self::Avi | Self::OtherVideo => kind.is_video(),
            Self::Zip | Self::Rar | Self::SevenZip | Self::Tar => kind == MediaKind::Comic,
            Self::Pdf => matches!(kind, MediaKind::Comic | MediaKind::Book),
            Self::Epub | Self::Mobi => kind == MediaKind::Book,
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A file the classifier recognised for a folder
///
/// `kind` is always the folder's kind; the classifier never re-decides it
/// downstream, and the extractor dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Classified {
    pub kind: MediaKind,
    pub format: ContainerFormat,
}

/// Classify a file for a folder of `folder_kind`
///
/// Returns `None` when the file is unrecognised, or recognised as something
/// that does not belong in this folder (an `.epub` in a movie folder).
pub fn classify(path: &Path, prefix: &[u8], folder_kind: MediaKind) -> Option<Classified> {
    let by_extension = format_for_extension(path);

    let format = match (sniff(prefix), by_extension) {
        // An EPUB whose first entry is not `mimetype` still sniffs as a zip
        (Some(ContainerFormat::Zip), Some(ContainerFormat::Epub)) => ContainerFormat::Epub,
        (Some(sniffed), _) => sniffed,
        (None, Some(ext)) => ext,
        (None, None) => return None,
    };

    if !format.fits(folder_kind) {
        tracing::debug!(
            path = %path.display(),
            format = %format,
            kind = %folder_kind,
            "Recognised format does not belong to folder kind"
        );
        return None;
    }

    Some(Classified {
        kind: folder_kind,
        format,
    })
}

/// Match a byte prefix against known container signatures
pub fn sniff(prefix: &[u8]) -> Option<ContainerFormat> {
    if prefix.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(ContainerFormat::Matroska);
    }

    if prefix.len() >= 8 && matches!(&prefix[4..8], b"ftyp" | b"moov" | b"mdat" | b"wide" | b"free" | b"skip") {
        return Some(ContainerFormat::Mp4);
    }

    if prefix.len() >= 12 && &prefix[0..4] == b"RIFF" && &prefix[8..12] == b"AVI " {
        return Some(ContainerFormat::Avi);
    }

    if prefix.starts_with(b"PK\x03\x04") {
        // EPUB OCF: the first entry is an uncompressed `mimetype` file
        if prefix.len() >= 58 && &prefix[30..38] == b"mimetype" && &prefix[38..58] == b"application/epub+zip" {
            return Some(ContainerFormat::Epub);
        }
        return Some(ContainerFormat::Zip);
    }

    if prefix.starts_with(b"%PDF-") {
        return Some(ContainerFormat::Pdf);
    }

    if prefix.len() >= 68 && &prefix[60..68] == b"BOOKMOBI" {
        return Some(ContainerFormat::Mobi);
    }

    if prefix.starts_with(b"Rar!\x1A\x07") {
        return Some(ContainerFormat::Rar);
    }

    if prefix.starts_with(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]) {
        return Some(ContainerFormat::SevenZip);
    }

    if prefix.len() >= 262 && &prefix[257..262] == b"ustar" {
        return Some(ContainerFormat::Tar);
    }

    if prefix.starts_with(b"FLV\x01")
        || prefix.starts_with(&[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11])
        || prefix.starts_with(&[0x00, 0x00, 0x01, 0xBA])
        || (prefix.len() > 188 && prefix[0] == 0x47 && prefix[188] == 0x47)
    {
        return Some(ContainerFormat::OtherVideo);
    }

    None
}

/// Extension table lookup (case-insensitive)
///
/// `pdf` maps to [`ContainerFormat::Pdf`], valid in both comic and book folders.
pub fn format_for_extension(path: &Path) -> Option<ContainerFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let format = match ext.as_str() {
        "mkv" | "webm" => ContainerFormat::Matroska,
        "mp4" | "m4v" | "mov" => ContainerFormat::Mp4,
        "avi" => ContainerFormat::Avi,
        "wmv" | "flv" | "mpg" | "mpeg" | "m2ts" | "ts" => ContainerFormat::OtherVideo,
        "cbz" => ContainerFormat::Zip,
        "cbr" => ContainerFormat::Rar,
        "cb7" => ContainerFormat::SevenZip,
        "cbt" => ContainerFormat::Tar,
        "pdf" => ContainerFormat::Pdf,
        "epub" => ContainerFormat::Epub,
        "mobi" | "azw3" => ContainerFormat::Mobi,
        _ => return None,
    };
    Some(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mp4_prefix() -> Vec<u8> {
        let mut bytes = vec![0, 0, 0, 0x18];
        bytes.extend_from_slice(b"ftypisom");
        bytes.resize(64, 0);
        bytes
    }

    #[test]
    fn signature_wins_over_extension() {
        // PDF bytes behind a video extension
        let classified = classify(Path::new("/x/lying.mkv"), b"%PDF-1.7\n", MediaKind::Book).unwrap();
        assert_eq!(classified.format, ContainerFormat::Pdf);
        assert_eq!(classified.kind, MediaKind::Book);

        assert!(classify(Path::new("/x/lying.mkv"), b"%PDF-1.7\n", MediaKind::Movie).is_none());
    }

    #[test]
    fn extension_used_when_nothing_sniffs() {
        let classified = classify(Path::new("/x/broken.MKV"), b"garbage", MediaKind::Movie).unwrap();
        assert_eq!(classified.format, ContainerFormat::Matroska);
    }

    #[test]
    fn unknown_files_are_unrecognised() {
        assert!(classify(Path::new("/x/notes.txt"), b"hello", MediaKind::Movie).is_none());
        assert!(classify(Path::new("/x/noext"), b"", MediaKind::Book).is_none());
    }

    #[test]
    fn format_must_fit_folder_kind() {
        assert!(classify(Path::new("/x/a.epub"), b"", MediaKind::Movie).is_none());
        assert!(classify(Path::new("/x/a.cbz"), b"", MediaKind::Book).is_none());
        assert!(classify(Path::new("/x/a.pdf"), b"", MediaKind::Comic).is_some());
        assert!(classify(Path::new("/x/a.pdf"), b"", MediaKind::Book).is_some());

        let tv = classify(Path::new("/x/e01.mp4"), &mp4_prefix(), MediaKind::Tv).unwrap();
        assert_eq!(tv.kind, MediaKind::Tv);
        assert_eq!(tv.format, ContainerFormat::Mp4);
    }

    #[test]
    fn sniffs_known_signatures() {
        assert_eq!(sniff(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]), Some(ContainerFormat::Matroska));
        assert_eq!(sniff(&mp4_prefix()), Some(ContainerFormat::Mp4));
        assert_eq!(sniff(b"RIFF\0\0\0\0AVI LIST"), Some(ContainerFormat::Avi));
        assert_eq!(sniff(b"RIFF\0\0\0\0WAVEfmt "), None);
        assert_eq!(sniff(b"Rar!\x1A\x07\x00"), Some(ContainerFormat::Rar));
        assert_eq!(sniff(b"PK\x03\x04rest"), Some(ContainerFormat::Zip));

        let mut mobi = vec![0u8; 78];
        mobi[60..68].copy_from_slice(b"BOOKMOBI");
        assert_eq!(sniff(&mobi), Some(ContainerFormat::Mobi));

        let mut tar = vec![0u8; 512];
        tar[257..262].copy_from_slice(b"ustar");
        assert_eq!(sniff(&tar), Some(ContainerFormat::Tar));
    }

    #[test]
    fn epub_mimetype_entry_is_detected() {
        let mut prefix = b"PK\x03\x04".to_vec();
        prefix.resize(30, 0);
        prefix.extend_from_slice(b"mimetypeapplication/epub+zip");
        assert_eq!(sniff(&prefix), Some(ContainerFormat::Epub));

        // plain zip renamed .epub is still treated as an EPUB
        let classified = classify(Path::new("/b/book.epub"), b"PK\x03\x04", MediaKind::Book).unwrap();
        assert_eq!(classified.format, ContainerFormat::Epub);
    }

    proptest! {
        #[test]
        fn classify_never_panics(prefix in proptest::collection::vec(any::<u8>(), 0..600), ext in "[a-z0-9]{0,5}") {
            let path = format!("/lib/file.{ext}");
            for kind in MediaKind::ALL {
                if let Some(classified) = classify(Path::new(&path), &prefix, kind) {
                    prop_assert_eq!(classified.kind, kind);
                    prop_assert!(classified.format.fits(kind));
                }
            }
        }
    }
}
