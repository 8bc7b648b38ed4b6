//! MOBI / AZW3 (PalmDB `BOOKMOBI`)
//!
//! Only record 0 is read: the MOBI header gives the full title and the
//! EXTH block carries author, publisher, description, ISBN, subjects and date.

use super::normalize_isbn;
use crate::error::{MetadataError, Result};
use crate::text::{clean, plain_text};
use ayiah_core::types::BookMetadata;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const FORMAT: &str = "MOBI";

const PALMDB_HEADER_LEN: usize = 78;
/// Record 0 holds every header we need; cap what we read of it
const MAX_RECORD0: u64 = 1024 * 1024;

const EXTH_AUTHOR: u32 = 100;
const EXTH_PUBLISHER: u32 = 101;
const EXTH_DESCRIPTION: u32 = 103;
const EXTH_ISBN: u32 = 104;
const EXTH_SUBJECT: u32 = 105;
const EXTH_PUBLISHED: u32 = 106;
const EXTH_UPDATED_TITLE: u32 = 503;
const EXTH_LANGUAGE: u32 = 524;

const CP1252: u32 = 1252;

pub(super) fn read(path: &Path) -> Result<BookMetadata> {
    let mut file = BufReader::new(File::open(path)?);
    let len = file.get_ref().metadata()?.len();

    let mut header = [0u8; PALMDB_HEADER_LEN];
    file.read_exact(&mut header)?;
    if &header[60..68] != b"BOOKMOBI" {
        return Err(MetadataError::malformed(FORMAT, "not a BOOKMOBI database"));
    }

    let records = u16::from_be_bytes([header[76], header[77]]);
    if records == 0 {
        return Err(MetadataError::malformed(FORMAT, "no records"));
    }

    let mut entries = [0u8; 16];
    let wanted = if records > 1 { 16 } else { 8 };
    file.read_exact(&mut entries[..wanted])?;
    let record0 = u64::from(be_u32(&entries, 0));
    let record0_end = if records > 1 {
        u64::from(be_u32(&entries, 8))
    } else {
        len
    };

    if record0 >= record0_end || record0_end > len {
        return Err(MetadataError::malformed(FORMAT, "bad record 0 offsets"));
    }

    let size = (record0_end - record0).min(MAX_RECORD0);
    file.seek(SeekFrom::Start(record0))?;
    let mut data = vec![0u8; size as usize];
    file.read_exact(&mut data)?;

    parse_record0(&data)
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn get_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes.get(at..at + 4).map(|_| be_u32(bytes, at))
}

fn parse_record0(data: &[u8]) -> Result<BookMetadata> {
    // 16-byte PalmDOC header, then the MOBI header
    if data.get(16..20) != Some(b"MOBI".as_slice()) {
        return Err(MetadataError::malformed(FORMAT, "missing MOBI header"));
    }

    let header_len = get_u32(data, 20).ok_or_else(|| MetadataError::malformed(FORMAT, "short MOBI header"))?;
    let encoding = get_u32(data, 28).unwrap_or(CP1252);
    let decode = |bytes: &[u8]| -> Option<String> {
        let text = if encoding == CP1252 {
            bytes.iter().map(|&b| char::from(b)).collect::<String>()
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        };
        clean(&text)
    };

    let mut book = BookMetadata::default();

    if let (Some(offset), Some(length)) = (get_u32(data, 84), get_u32(data, 88)) {
        let (offset, length) = (offset as usize, length as usize);
        if let Some(bytes) = data.get(offset..offset.saturating_add(length)) {
            book.title = decode(bytes);
        }
    }

    let has_exth = get_u32(data, 128).is_some_and(|flags| flags & 0x40 != 0);
    if has_exth {
        let exth_start = 16 + header_len as usize;
        if data.get(exth_start..exth_start + 4) != Some(b"EXTH".as_slice()) {
            return Err(MetadataError::malformed(FORMAT, "EXTH flag set but no EXTH block"));
        }
        let count = get_u32(data, exth_start + 8).unwrap_or(0);

        let mut pos = exth_start + 12;
        for _ in 0..count {
            let (Some(kind), Some(len)) = (get_u32(data, pos), get_u32(data, pos + 4)) else {
                break;
            };
            let len = len as usize;
            let Some(value) = data.get(pos + 8..pos + len.max(8)) else {
                break;
            };
            pos += len.max(8);

            let Some(text) = decode(value) else { continue };
            match kind {
                EXTH_AUTHOR => book.authors.push(text),
                EXTH_PUBLISHER => book.publisher = Some(text),
                EXTH_DESCRIPTION => book.description = plain_text(&text),
                EXTH_ISBN => book.isbn = normalize_isbn(&text).or(Some(text)),
                EXTH_SUBJECT => book.genres.push(text),
                EXTH_PUBLISHED => book.release_date = Some(text),
                EXTH_UPDATED_TITLE => book.title = Some(text),
                EXTH_LANGUAGE => book.language = Some(text),
                _ => {}
            }
        }
    }

    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exth(records: &[(u32, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (kind, value) in records {
            body.extend_from_slice(&kind.to_be_bytes());
            body.extend_from_slice(&((value.len() + 8) as u32).to_be_bytes());
            body.extend_from_slice(value.as_bytes());
        }
        let mut out = b"EXTH".to_vec();
        out.extend_from_slice(&((body.len() + 12) as u32).to_be_bytes());
        out.extend_from_slice(&(records.len() as u32).to_be_bytes());
        out.extend(body);
        out
    }

    /// PalmDB header, two record entries, and record 0
    fn mobi(title: &str, records: &[(u32, &str)]) -> Vec<u8> {
        const MOBI_HEADER_LEN: usize = 232;

        let mut record0 = vec![0u8; 16];
        let mut mobi_header = vec![0u8; MOBI_HEADER_LEN];
        mobi_header[0..4].copy_from_slice(b"MOBI");
        mobi_header[4..8].copy_from_slice(&(MOBI_HEADER_LEN as u32).to_be_bytes());
        mobi_header[12..16].copy_from_slice(&65001u32.to_be_bytes());
        mobi_header[112..116].copy_from_slice(&0x40u32.to_be_bytes());
        record0.extend(mobi_header);
        record0.extend(exth(records));

        let title_offset = record0.len() as u32;
        record0.extend_from_slice(title.as_bytes());
        record0[84..88].copy_from_slice(&title_offset.to_be_bytes());
        record0[88..92].copy_from_slice(&(title.len() as u32).to_be_bytes());

        let mut file = vec![0u8; PALMDB_HEADER_LEN];
        file[0..8].copy_from_slice(b"testbook");
        file[60..68].copy_from_slice(b"BOOKMOBI");
        file[76..78].copy_from_slice(&2u16.to_be_bytes());

        let record0_offset = (PALMDB_HEADER_LEN + 16 + 2) as u32;
        let record1_offset = record0_offset + record0.len() as u32;
        file.extend_from_slice(&record0_offset.to_be_bytes());
        file.extend_from_slice(&[0u8; 4]);
        file.extend_from_slice(&record1_offset.to_be_bytes());
        file.extend_from_slice(&[0u8; 4]);
        file.extend_from_slice(&[0u8; 2]);
        file.extend(record0);
        file.extend_from_slice(b"record one text");
        file
    }

    fn parse_file(bytes: &[u8]) -> Result<BookMetadata> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.azw3");
        std::fs::write(&path, bytes).unwrap();
        read(&path)
    }

    #[test]
    fn reads_full_name_and_exth() {
        let bytes = mobi(
            "The Left Hand of Darkness",
            &[
                (EXTH_AUTHOR, "Ursula K. Le Guin"),
                (EXTH_PUBLISHER, "Ace"),
                (EXTH_DESCRIPTION, "<p>Winter.</p>"),
                (EXTH_ISBN, "978-0-441-47812-5"),
                (EXTH_SUBJECT, "Science Fiction"),
                (EXTH_PUBLISHED, "1969-03-01"),
                (EXTH_LANGUAGE, "en"),
            ],
        );

        let book = parse_file(&bytes).unwrap();
        assert_eq!(book.title.as_deref(), Some("The Left Hand of Darkness"));
        assert_eq!(book.authors, vec!["Ursula K. Le Guin"]);
        assert_eq!(book.publisher.as_deref(), Some("Ace"));
        assert_eq!(book.description.as_deref(), Some("Winter."));
        assert_eq!(book.isbn.as_deref(), Some("9780441478125"));
        assert_eq!(book.genres, vec!["Science Fiction"]);
        assert_eq!(book.release_date.as_deref(), Some("1969-03-01"));
        assert_eq!(book.language.as_deref(), Some("en"));
    }

    #[test]
    fn updated_title_overrides_full_name() {
        let bytes = mobi("Old Name", &[(EXTH_UPDATED_TITLE, "New Name")]);
        assert_eq!(parse_file(&bytes).unwrap().title.as_deref(), Some("New Name"));
    }

    #[test]
    fn non_mobi_database_is_malformed() {
        let mut bytes = mobi("x", &[]);
        bytes[60..68].copy_from_slice(b"TEXtREAd");
        assert!(matches!(parse_file(&bytes), Err(MetadataError::Malformed { .. })));
    }

    #[test]
    fn truncated_header_is_not_transient() {
        let err = parse_file(b"BOOKMOBI").unwrap_err();
        assert!(!err.is_transient());
    }
}
