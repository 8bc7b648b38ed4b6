//! EPUB: `META-INF/container.xml` → OPF package document → Dublin Core

use super::normalize_isbn;
use crate::error::{MetadataError, Result};
use crate::text::{attributes, element_text, element_texts, start_tags};
use ayiah_core::types::BookMetadata;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

const FORMAT: &str = "EPUB";
const CONTAINER: &str = "META-INF/container.xml";

/// Largest container or package document we read
const MAX_DOCUMENT: u64 = 4 * 1024 * 1024;

pub(super) fn read(path: &Path) -> Result<BookMetadata> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

    let container = read_entry(&mut archive, CONTAINER)?
        .ok_or_else(|| MetadataError::malformed(FORMAT, "missing META-INF/container.xml"))?;

    let rootfile = start_tags(&container, "rootfile")
        .into_iter()
        .filter_map(|tag| attributes(tag).remove("full-path"))
        .next()
        .ok_or_else(|| MetadataError::malformed(FORMAT, "container.xml names no rootfile"))?;

    let opf = read_entry(&mut archive, &rootfile)?
        .ok_or_else(|| MetadataError::malformed(FORMAT, format!("missing package document {rootfile}")))?;

    let base = rootfile.rsplit_once('/').map_or("", |(dir, _)| dir);
    Ok(parse_package(&opf, base))
}

fn read_entry<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut raw = Vec::new();
    entry.by_ref().take(MAX_DOCUMENT).read_to_end(&mut raw)?;
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

/// Dublin Core fields of an OPF document; `base` is the OPF's directory
fn parse_package(opf: &str, base: &str) -> BookMetadata {
    let identifiers = element_texts(opf, "dc:identifier");
    let isbn = identifiers.iter().find_map(|id| normalize_isbn(id));

    BookMetadata {
        title: element_text(opf, "dc:title"),
        authors: element_texts(opf, "dc:creator"),
        publisher: element_text(opf, "dc:publisher"),
        language: element_text(opf, "dc:language"),
        isbn,
        description: element_text(opf, "dc:description"),
        release_date: element_text(opf, "dc:date"),
        genres: element_texts(opf, "dc:subject"),
        cover_path: cover_href(opf).map(|href| join(base, &href)),
        page_count: None,
    }
}

/// EPUB 2 `<meta name="cover" content="id">` or EPUB 3 `properties="cover-image"`
fn cover_href(opf: &str) -> Option<String> {
    let items: Vec<_> = start_tags(opf, "item").into_iter().map(attributes).collect();

    if let Some(item) = items.iter().find(|a| {
        a.get("properties")
            .is_some_and(|p| p.split_whitespace().any(|p| p == "cover-image"))
    }) {
        return item.get("href").cloned();
    }

    let cover_id = start_tags(opf, "meta")
        .into_iter()
        .map(attributes)
        .find(|a| a.get("name").is_some_and(|n| n == "cover"))
        .and_then(|mut a| a.remove("content"))?;

    items
        .iter()
        .find(|a| a.get("id") == Some(&cover_id))
        .and_then(|a| a.get("href").cloned())
}

fn join(base: &str, href: &str) -> String {
    if base.is_empty() {
        href.to_string()
    } else {
        format!("{base}/{href}")
    }
}
