//! Ayiah Metadata
//!
//! Content classification and metadata extraction for the library scanner.
//!
//! This crate provides:
//! - Content sniffing with an extension-table fallback (video, comic, book)
//! - Per-kind extraction strategies reading only container headers
//! - Title derivation from file names
//!
//! # Example
//!
//! ```rust,no_run
//! use ayiah_core::MediaKind;
//! use ayiah_metadata::{classify, MetadataExtractor, StandardExtractor};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let path = Path::new("/srv/movies/Heat (1995).mkv");
//! let prefix = std::fs::read(path)?;
//!
//! if let Some(target) = classify(path, &prefix[..prefix.len().min(512)], MediaKind::Movie) {
//!     let outcome = StandardExtractor::new().extract(path, target)?;
//!     println!("{outcome:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod book;
mod classifier;
mod comic;
mod error;
mod extractor;
mod pdf;
mod text;
mod title;
mod video;

pub use classifier::{classify, format_for_extension, sniff, Classified, ContainerFormat, MIN_SNIFF_LEN};
pub use error::{MetadataError, Result};
pub use extractor::{ExtractionOutcome, MetadataExtractor, StandardExtractor};
pub use title::{derive_title, DerivedTitle};
