//! Display titles derived from file names

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static TRAILING_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s*(?:\((\d{4})\)|\[(\d{4})\])\s*$").expect("year regex should compile")
});

/// Title and optional release year parsed from a file stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTitle {
    pub title: String,
    pub year: Option<u16>,
}

/// Derive a title from `path`'s stem
///
/// `Heat.(1995).mkv` → `Heat` / 1995. Dots and underscores become spaces;
/// a trailing `(YYYY)` or `[YYYY]` is split off as the year.
pub fn derive_title(path: &Path) -> DerivedTitle {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let normalized = stem
        .replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if normalized.is_empty() {
        return DerivedTitle {
            title: if stem.is_empty() { "Unknown".to_string() } else { stem },
            year: None,
        };
    }

    if let Some(caps) = TRAILING_YEAR.captures(&normalized) {
        let year = caps
            .get(2)
            .or_else(|| caps.get(3))
            .and_then(|m| m.as_str().parse::<u16>().ok())
            .filter(|y| (1870..=2100).contains(y));

        if let (Some(year), Some(title)) = (year, caps.get(1)) {
            return DerivedTitle {
                title: title.as_str().to_string(),
                year: Some(year),
            };
        }
    }

    DerivedTitle {
        title: normalized,
        year: None,
    }
}
