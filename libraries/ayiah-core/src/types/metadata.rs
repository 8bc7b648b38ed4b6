//! Type-specific metadata records
//!
//! Each media item owns at most one record, of the variant matching its kind.
//! A missing record only means extraction has not succeeded yet.

use super::MediaKind;
use serde::{Deserialize, Serialize};

/// Descriptive metadata, tagged by extraction strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetadataRecord {
    /// Movies and TV episodes
    Video(VideoMetadata),
    /// Comic archives
    Comic(ComicMetadata),
    /// E-books and documents
    Book(BookMetadata),
}

impl MetadataRecord {
    /// Whether this record may be attached to an item of `kind`
    pub fn matches_kind(&self, kind: MediaKind) -> bool {
        match self {
            Self::Video(_) => kind.is_video(),
            Self::Comic(_) => kind == MediaKind::Comic,
            Self::Book(_) => kind == MediaKind::Book,
        }
    }

    /// Title carried by the record, if any
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Video(v) => v.title.as_deref(),
            Self::Comic(c) => c.title.as_deref(),
            Self::Book(b) => b.title.as_deref(),
        }
    }

    pub fn genres(&self) -> &[String] {
        match self {
            Self::Video(v) => &v.genres,
            Self::Comic(c) => &c.genres,
            Self::Book(b) => &b.genres,
        }
    }

    /// True when the record holds nothing a user would call descriptive
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Video(v) => v.is_empty(),
            Self::Comic(c) => c.is_empty(),
            Self::Book(b) => b.is_empty(),
        }
    }
}

/// Descriptive video metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub tmdb_id: Option<i64>,
    pub tvdb_id: Option<i64>,
    pub imdb_id: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    /// ISO-8601 date or year as found in the container
    pub release_date: Option<String>,
    /// Runtime in minutes
    pub runtime: Option<i32>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub content_rating: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl VideoMetadata {
    /// Runtime alone is structural, not descriptive
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.tmdb_id.is_none()
            && self.tvdb_id.is_none()
            && self.imdb_id.is_none()
            && self.overview.is_none()
            && self.poster_path.is_none()
            && self.backdrop_path.is_none()
            && self.release_date.is_none()
            && self.vote_average.is_none()
            && self.content_rating.is_none()
            && self.genres.is_empty()
    }
}

/// Comic archive metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComicMetadata {
    pub title: Option<String>,
    pub series: Option<String>,
    pub issue_number: Option<String>,
    pub writer: Option<String>,
    pub publisher: Option<String>,
    pub summary: Option<String>,
    pub release_date: Option<String>,
    pub page_count: Option<u32>,
    /// Archive entry used as the cover
    pub cover_page: Option<String>,
    pub community_rating: Option<f64>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl ComicMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.series.is_none()
            && self.issue_number.is_none()
            && self.writer.is_none()
            && self.publisher.is_none()
            && self.summary.is_none()
            && self.release_date.is_none()
            && self.page_count.is_none()
            && self.cover_page.is_none()
            && self.community_rating.is_none()
            && self.genres.is_empty()
    }
}

/// E-book / document metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<String>,
    pub page_count: Option<u32>,
    /// Path of the cover image inside the container
    pub cover_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl BookMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.authors.is_empty()
            && self.publisher.is_none()
            && self.language.is_none()
            && self.isbn.is_none()
            && self.description.is_none()
            && self.release_date.is_none()
            && self.page_count.is_none()
            && self.cover_path.is_none()
            && self.genres.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_record_matches_movie_and_tv_only() {
        let record = MetadataRecord::Video(VideoMetadata::default());
        assert!(record.matches_kind(MediaKind::Movie));
        assert!(record.matches_kind(MediaKind::Tv));
        assert!(!record.matches_kind(MediaKind::Comic));
        assert!(!record.matches_kind(MediaKind::Book));
    }

    #[test]
    fn runtime_alone_is_not_descriptive() {
        let video = VideoMetadata {
            runtime: Some(90),
            ..Default::default()
        };
        assert!(video.is_empty());

        let titled = VideoMetadata {
            title: Some("Heat".to_string()),
            ..Default::default()
        };
        assert!(!titled.is_empty());
    }

    #[test]
    fn record_serializes_with_kind_tag() {
        let record = MetadataRecord::Book(BookMetadata {
            title: Some("Dune".to_string()),
            authors: vec!["Frank Herbert".to_string()],
            ..Default::default()
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "book");
        assert_eq!(json["title"], "Dune");

        let back: MetadataRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
