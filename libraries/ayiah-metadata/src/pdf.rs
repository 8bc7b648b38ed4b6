//! PDF document information
//!
//! Shared by the comic and book strategies. Reads a bounded window from the
//! head and tail of the file, resolves the trailer's `/Info` dictionary and
//! counts page objects. Compressed object streams are not inflated, so a
//! PDF that keeps everything in them yields no fields (not an error).

use crate::error::{MetadataError, Result};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const FORMAT: &str = "PDF";

/// Bytes read from each end of large files
const WINDOW: u64 = 8 * 1024 * 1024;

static INFO_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)/Info\s*(\d+)\s+(\d+)\s+R").expect("info regex should compile"));

static PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)/Type\s*/Page(?:[^s]|$)").expect("page regex should compile"));

/// Fields of the `/Info` dictionary plus a page count
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PdfInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    pub creation_date: Option<String>,
    pub page_count: Option<u32>,
}

pub(crate) fn read(path: &Path) -> Result<PdfInfo> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let bytes = read_window(&mut file, len)?;
    parse(&bytes)
}

fn read_window(file: &mut File, len: u64) -> Result<Vec<u8>> {
    if len <= WINDOW * 2 {
        let mut bytes = Vec::with_capacity(len as usize);
        file.read_to_end(&mut bytes)?;
        return Ok(bytes);
    }

    let mut bytes = Vec::with_capacity((WINDOW * 2 + 1) as usize);
    file.by_ref().take(WINDOW).read_to_end(&mut bytes)?;
    bytes.push(b'\n');
    file.seek(SeekFrom::Start(len - WINDOW))?;
    file.take(WINDOW).read_to_end(&mut bytes)?;
    Ok(bytes)
}

pub(crate) fn parse(bytes: &[u8]) -> Result<PdfInfo> {
    let head = &bytes[..bytes.len().min(1024)];
    if find(head, b"%PDF-").is_none() {
        return Err(MetadataError::malformed(FORMAT, "missing %PDF- header"));
    }

    let pages = PAGE.find_iter(bytes).count();
    let mut info = PdfInfo {
        page_count: u32::try_from(pages).ok().filter(|&n| n > 0),
        ..Default::default()
    };

    // The last /Info reference belongs to the newest trailer
    let Some(reference) = INFO_REF.captures_iter(bytes).last() else {
        return Ok(info);
    };
    let (Some(number), Some(generation)) = (reference.get(1), reference.get(2)) else {
        return Ok(info);
    };

    let Some(dict) = object_body(bytes, number.as_bytes(), generation.as_bytes()) else {
        return Ok(info);
    };

    info.title = string_value(dict, b"/Title");
    info.author = string_value(dict, b"/Author");
    info.subject = string_value(dict, b"/Subject");
    info.keywords = string_value(dict, b"/Keywords");
    info.creation_date = string_value(dict, b"/CreationDate").and_then(|d| pdf_date(&d));

    Ok(info)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Body of `N G obj ... endobj`, last definition wins (incremental updates)
fn object_body<'a>(bytes: &'a [u8], number: &[u8], generation: &[u8]) -> Option<&'a [u8]> {
    let pattern = format!(
        r"(?s-u)(?:^|[^0-9]){}\s+{}\s+obj(.*?)endobj",
        String::from_utf8_lossy(number),
        String::from_utf8_lossy(generation)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures_iter(bytes).last()?;
    caps.get(1).map(|m| m.as_bytes())
}

/// Value of a string entry (`/Key (literal)` or `/Key <hex>`)
fn string_value(dict: &[u8], key: &[u8]) -> Option<String> {
    let mut offset = 0;
    while let Some(found) = find(&dict[offset..], key) {
        let after = offset + found + key.len();
        offset = after;

        // `/Title` must not match `/TitleFoo`
        if dict.get(after).is_some_and(u8::is_ascii_alphanumeric) {
            continue;
        }

        let rest = &dict[after..];
        let value_start = rest.iter().position(|b| !b.is_ascii_whitespace())?;
        let raw = match rest[value_start] {
            b'(' => literal_string(&rest[value_start + 1..]),
            b'<' => hex_string(&rest[value_start + 1..]),
            _ => None,
        }?;
        return crate::text::clean(&decode_text(&raw));
    }
    None
}

fn literal_string(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut iter = bytes.iter().copied().peekable();

    while let Some(b) = iter.next() {
        match b {
            b'\\' => match iter.next()? {
                b'n' => out.push(b'\n'),
                b'r' => out.push(b'\r'),
                b't' => out.push(b'\t'),
                b'b' => out.push(0x08),
                b'f' => out.push(0x0C),
                b'\r' => {
                    if iter.peek() == Some(&b'\n') {
                        iter.next();
                    }
                }
                b'\n' => {}
                d @ b'0'..=b'7' => {
                    let mut value = u32::from(d - b'0');
                    for _ in 0..2 {
                        match iter.peek() {
                            Some(&n @ b'0'..=b'7') => {
                                value = value * 8 + u32::from(n - b'0');
                                iter.next();
                            }
                            _ => break,
                        }
                    }
                    out.push((value & 0xFF) as u8);
                }
                other => out.push(other),
            },
            b'(' => {
                depth += 1;
                out.push(b);
            }
            b')' => {
                if depth == 0 {
                    return Some(out);
                }
                depth -= 1;
                out.push(b);
            }
            _ => out.push(b),
        }
    }
    None
}

fn hex_string(bytes: &[u8]) -> Option<Vec<u8>> {
    let end = bytes.iter().position(|&b| b == b'>')?;
    let digits: Vec<u8> = bytes[..end]
        .iter()
        .copied()
        .filter(u8::is_ascii_hexdigit)
        .collect();

    let value = |d: u8| -> u8 {
        match d {
            b'0'..=b'9' => d - b'0',
            b'a'..=b'f' => d - b'a' + 10,
            _ => d - b'A' + 10,
        }
    };

    // An odd final digit is followed by an implicit 0
    Some(
        digits
            .chunks(2)
            .map(|pair| (value(pair[0]) << 4) | pair.get(1).map_or(0, |&d| value(d)))
            .collect(),
    )
}

/// UTF-16BE with BOM, UTF-8 with BOM, otherwise Latin-1
fn decode_text(raw: &[u8]) -> String {
    if let Some(utf16) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = raw.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    raw.iter().map(|&b| char::from(b)).collect()
}

/// `D:20230415120000+02'00'` → `2023-04-15`
fn pdf_date(value: &str) -> Option<String> {
    let digits: String = value
        .trim_start_matches("D:")
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();

    match digits.len() {
        0..=3 => None,
        4 | 5 => Some(digits[..4].to_string()),
        6 | 7 => Some(format!("{}-{}", &digits[..4], &digits[4..6])),
        _ => Some(format!("{}-{}-{}", &digits[..4], &digits[4..6], &digits[6..8])),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::pdf;
    use super::*;

    #[test]
    fn reads_info_dictionary_and_pages() {
        let bytes = pdf(
            r"/Title (Dune \(Deluxe\)) /Author (Frank Herbert) /Subject (Arrakis) /Keywords (scifi, desert) /CreationDate (D:19650801000000Z)",
            3,
        );
        let info = parse(&bytes).unwrap();
        assert_eq!(info.title.as_deref(), Some("Dune (Deluxe)"));
        assert_eq!(info.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(info.subject.as_deref(), Some("Arrakis"));
        assert_eq!(info.keywords.as_deref(), Some("scifi, desert"));
        assert_eq!(info.creation_date.as_deref(), Some("1965-08-01"));
        assert_eq!(info.page_count, Some(3));
    }

    #[test]
    fn decodes_utf16_hex_strings() {
        // FEFF "Hé"
        let bytes = pdf("/Title <FEFF004800E9>", 1);
        assert_eq!(parse(&bytes).unwrap().title.as_deref(), Some("Hé"));
    }

    #[test]
    fn title_key_does_not_match_longer_names() {
        let bytes = pdf("/TitleSort (wrong) /Title (right)", 1);
        assert_eq!(parse(&bytes).unwrap().title.as_deref(), Some("right"));
    }

    #[test]
    fn missing_info_is_not_an_error() {
        let bytes = b"%PDF-1.7\n1 0 obj\n<< /Type /Page >>\nendobj\n".to_vec();
        let info = parse(&bytes).unwrap();
        assert_eq!(info.title, None);
        assert_eq!(info.page_count, Some(1));
    }

    #[test]
    fn non_pdf_is_malformed() {
        assert!(matches!(
            parse(b"GIF89a not a pdf"),
            Err(MetadataError::Malformed { .. })
        ));
    }

    #[test]
    fn octal_escapes_and_partial_dates() {
        assert_eq!(literal_string(br"caf\351)").unwrap(), b"caf\xe9".to_vec());
        assert_eq!(pdf_date("D:2004").as_deref(), Some("2004"));
        assert_eq!(pdf_date("D:200403").as_deref(), Some("2004-03"));
        assert_eq!(pdf_date("garbage"), None);
    }
}
