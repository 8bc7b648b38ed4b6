//! E-book and document strategy (EPUB, MOBI/AZW3, PDF)

mod epub;
mod mobi;

use crate::classifier::ContainerFormat;
use crate::error::{MetadataError, Result};
use crate::extractor::ExtractionOutcome;
use crate::pdf;
use crate::text::split_list;
use ayiah_core::types::{BookMetadata, MetadataRecord};
use std::path::Path;

pub(crate) fn extract(path: &Path, format: ContainerFormat) -> Result<ExtractionOutcome> {
    let book = match format {
        ContainerFormat::Epub => epub::read(path)?,
        ContainerFormat::Mobi => mobi::read(path)?,
        ContainerFormat::Pdf => from_pdf(pdf::read(path)?),
        other => {
            return Err(MetadataError::UnsupportedFormat(format!(
                "{other} is not a book container"
            )))
        }
    };

    Ok(ExtractionOutcome::from_record(MetadataRecord::Book(book)))
}

fn from_pdf(info: pdf::PdfInfo) -> BookMetadata {
    BookMetadata {
        title: info.title,
        authors: info.author.map(|a| split_list(&a)).unwrap_or_default(),
        description: info.subject,
        release_date: info.creation_date,
        page_count: info.page_count,
        genres: info.keywords.map(|k| split_list(&k)).unwrap_or_default(),
        ..Default::default()
    }
}

/// Digits (and a trailing `X`) of an ISBN-10/13, if `value` is one
pub(crate) fn normalize_isbn(value: &str) -> Option<String> {
    let stripped = value
        .trim()
        .trim_start_matches("urn:isbn:")
        .trim_start_matches("isbn:")
        .trim_start_matches("ISBN");
    let digits: String = stripped
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let valid_shape = match digits.len() {
        10 => digits[..9].chars().all(|c| c.is_ascii_digit()),
        13 => digits.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    };
    let only_isbn_chars = stripped
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, 'X' | 'x' | '-' | ' ' | ':'));

    (valid_shape && only_isbn_chars).then_some(digits)
}
