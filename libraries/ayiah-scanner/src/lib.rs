//! Ayiah Library Scanner
//!
//! Discovers media files under configured library folders, extracts their
//! metadata, and reconciles the results into the catalog.
//!
//! # Features
//!
//! - Folder walking with ignore lists, a minimum size, and a symlink escape guard
//! - Content-fingerprint metadata cache with single-flight extraction
//! - Per-path reconciliation (add / update / skip / remove)
//! - Single-flight scans per folder over one shared worker pool
//! - Cooperative cancellation with partial outcomes
//! - Debounced filesystem watching with drop-and-rescan backpressure
//!
//! # Architecture
//!
//! - `walker`: candidate files under a folder root
//! - `fingerprint` / `cache`: extraction deduplication
//! - `reconciler`: the only writer to the catalog
//! - `orchestrator`: full folder scans
//! - `watcher`: change events routed into the reconciler
//! - `engine`: caller-facing facade

mod error;

pub mod cache;
pub mod config;
pub mod engine;
pub mod fingerprint;
pub mod orchestrator;
pub mod reconciler;
pub mod walker;
pub mod watcher;

pub use cache::{CacheKey, CacheStats, MetadataCache};
pub use config::ScannerConfig;
pub use engine::ScanEngine;
pub use error::{Result, ScanError};
pub use fingerprint::Fingerprint;
pub use walker::{FolderWalker, WalkEntry};
pub use watcher::WatcherEvent;
