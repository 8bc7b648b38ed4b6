//! Comic archive strategy
//!
//! CBZ archives are opened through their central directory only: pages are
//! counted from entry names and `ComicInfo.xml` is the sole entry read.
//! CBR / CB7 / CBT are cataloged on a valid signature without parsing.

use crate::classifier::ContainerFormat;
use crate::error::{MetadataError, Result};
use crate::extractor::{verify_signature, ExtractionOutcome};
use crate::pdf;
use crate::text::{element_text, split_list};
use ayiah_core::types::{ComicMetadata, MetadataRecord};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "avif", "jxl"];

/// Largest `ComicInfo.xml` we read
const MAX_COMIC_INFO: u64 = 1024 * 1024;

pub(crate) fn extract(path: &Path, format: ContainerFormat) -> Result<ExtractionOutcome> {
    let comic = match format {
        ContainerFormat::Zip => read_cbz(path)?,
        ContainerFormat::Rar | ContainerFormat::SevenZip | ContainerFormat::Tar => {
            return verify_signature(path, format);
        }
        ContainerFormat::Pdf => from_pdf(pdf::read(path)?),
        other => {
            return Err(MetadataError::UnsupportedFormat(format!(
                "{other} is not a comic container"
            )))
        }
    };

    Ok(ExtractionOutcome::from_record(MetadataRecord::Comic(comic)))
}

fn read_cbz(path: &Path) -> Result<ComicMetadata> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

    let mut pages: Vec<String> = Vec::new();
    let mut comic_info = None;

    for name in archive.file_names() {
        if name.ends_with('/') || name.starts_with("__MACOSX/") {
            continue;
        }
        let base = name.rsplit('/').next().unwrap_or(name);
        if base.starts_with('.') {
            continue;
        }
        if base.eq_ignore_ascii_case("ComicInfo.xml") {
            comic_info.get_or_insert_with(|| name.to_string());
            continue;
        }
        if is_image(base) {
            pages.push(name.to_string());
        }
    }

    pages.sort_by(|a, b| natural_cmp(a, b));

    let mut comic = ComicMetadata {
        page_count: u32::try_from(pages.len()).ok().filter(|&n| n > 0),
        cover_page: pages.first().cloned(),
        ..Default::default()
    };

    if let Some(name) = comic_info {
        let mut raw = Vec::new();
        archive.by_name(&name)?.take(MAX_COMIC_INFO).read_to_end(&mut raw)?;
        apply_comic_info(&mut comic, &String::from_utf8_lossy(&raw));
    }

    Ok(comic)
}

fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|i| e.eq_ignore_ascii_case(i)))
}

fn apply_comic_info(comic: &mut ComicMetadata, xml: &str) {
    comic.title = element_text(xml, "Title");
    comic.series = element_text(xml, "Series");
    comic.issue_number = element_text(xml, "Number");
    comic.summary = element_text(xml, "Summary");
    comic.writer = element_text(xml, "Writer");
    comic.publisher = element_text(xml, "Publisher");
    comic.genres = element_text(xml, "Genre").map(|g| split_list(&g)).unwrap_or_default();
    comic.community_rating = element_text(xml, "CommunityRating").and_then(|r| r.parse().ok());

    if comic.page_count.is_none() {
        comic.page_count = element_text(xml, "PageCount").and_then(|n| n.parse().ok());
    }

    let year = element_text(xml, "Year").filter(|y| y.len() == 4);
    let month = element_text(xml, "Month").and_then(|m| m.parse::<u8>().ok()).filter(|m| (1..=12).contains(m));
    let day = element_text(xml, "Day").and_then(|d| d.parse::<u8>().ok()).filter(|d| (1..=31).contains(d));
    comic.release_date = match (year, month, day) {
        (Some(y), Some(m), Some(d)) => Some(format!("{y}-{m:02}-{d:02}")),
        (Some(y), Some(m), None) => Some(format!("{y}-{m:02}")),
        (Some(y), _, _) => Some(y),
        _ => None,
    };
}

fn from_pdf(info: pdf::PdfInfo) -> ComicMetadata {
    ComicMetadata {
        title: info.title,
        writer: info.author,
        summary: info.subject,
        release_date: info.creation_date,
        page_count: info.page_count,
        genres: info.keywords.map(|k| split_list(&k)).unwrap_or_default(),
        ..Default::default()
    }
}

/// Order `page2` before `page10`; text runs compare case-insensitively
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = runs(a);
    let mut right = runs(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (x.parse_digits(), y.parse_digits()) {
                    (Some(nx), Some(ny)) => nx.len().cmp(&ny.len()).then_with(|| nx.cmp(ny)),
                    _ => x.text.to_lowercase().cmp(&y.text.to_lowercase()),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

struct Run<'a> {
    text: &'a str,
    digits: bool,
}

impl<'a> Run<'a> {
    /// Digits without leading zeros, for numeric comparison
    fn parse_digits(&self) -> Option<&'a str> {
        self.digits.then(|| {
            let trimmed = self.text.trim_start_matches('0');
            if trimmed.is_empty() {
                "0"
            } else {
                trimmed
            }
        })
    }
}

fn runs(s: &str) -> impl Iterator<Item = Run<'_>> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map_or(rest.len(), |(i, _)| i);
        let (text, tail) = rest.split_at(end);
        rest = tail;
        Some(Run { text, digits })
    })
}
