//! Scan reconciler
//!
//! Converges the catalog towards the filesystem one path at a time. Both the
//! orchestrator's full walks and the watcher's single-path events route
//! through here, and every catalog write for a path happens while holding
//! that path's lock.

use crate::cache::{CacheKey, MetadataCache};
use crate::config::ScannerConfig;
use crate::fingerprint::{read_prefix, Fingerprint};
use crate::walker::{FolderWalker, WalkEntry};
use ayiah_core::types::{
    IssueKind, LibraryFolder, MediaItem, MetadataRecord, ScanOutcome, UpsertMediaItem,
};
use ayiah_core::{AyiahError, CatalogStore};
use ayiah_metadata::{classify, derive_title, ExtractionOutcome, MetadataError, MetadataExtractor};
use dashmap::DashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// Single-path reconciliation against the catalog
pub struct Reconciler {
    store: Arc<dyn CatalogStore>,
    extractor: Arc<dyn MetadataExtractor>,
    cache: Arc<MetadataCache>,
    config: Arc<ScannerConfig>,
    path_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        extractor: Arc<dyn MetadataExtractor>,
        cache: Arc<MetadataCache>,
        config: Arc<ScannerConfig>,
    ) -> Self {
        Self {
            store,
            extractor,
            cache,
            config,
            path_locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Reconcile one path of `folder`
    ///
    /// A file is added, updated, skipped or removed exactly as a full scan
    /// would; a missing path removes its item (or every item below it, for
    /// a vanished directory); an existing directory is walked.
    pub async fn reconcile_path(&self, folder: &LibraryFolder, path: &Path) -> ScanOutcome {
        let walker = FolderWalker::new(folder.root(), &self.config);
        let canonical = canonical_path(path);

        if walker.is_excluded(&canonical) {
            debug!(path = %canonical.display(), folder_id = folder.id, "Path outside folder or ignored");
            return ScanOutcome::new(folder.id);
        }

        if canonical.is_dir() {
            return self.reconcile_directory(folder, &canonical).await;
        }

        self.reconcile_file(folder, &canonical).await
    }

    /// Reconcile a file whose path is already canonical
    pub(crate) async fn reconcile_file(&self, folder: &LibraryFolder, path: &Path) -> ScanOutcome {
        let key = path_key(path);
        let _lock = self.lock_path(&key).await;

        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return ScanOutcome::new(folder.id),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return self.remove_missing(folder, &key).await;
            }
            Err(err) => return read_failed(folder, &key, &err.to_string()),
        };

        if meta.len() < self.config.min_file_size {
            debug!(path = %key, size = meta.len(), "Below minimum size, ignoring");
            return ScanOutcome::new(folder.id);
        }

        self.reconcile_existing_file(folder, path, &key, &meta).await
    }

    async fn reconcile_existing_file(
        &self,
        folder: &LibraryFolder,
        path: &Path,
        key: &str,
        meta: &Metadata,
    ) -> ScanOutcome {
        let mut outcome = ScanOutcome::new(folder.id);
        let file_size = meta.len() as i64;
        let file_mtime = mtime_millis(meta);

        let existing = match self.store.get_item_by_path(key).await {
            Ok(existing) => existing,
            Err(err) => return store_failed(folder, key, &err),
        };

        if let Some(item) = &existing {
            if item.library_folder_id != folder.id {
                debug!(
                    path = %key,
                    folder_id = folder.id,
                    owner = item.library_folder_id,
                    "Path already claimed by another folder"
                );
                outcome.skipped += 1;
                return outcome;
            }
            if item.is_unchanged(file_size, file_mtime) && !self.config.force_refresh {
                debug!(path = %key, "Unchanged");
                outcome.skipped += 1;
                return outcome;
            }
        }

        let prefix = {
            let owned = path.to_path_buf();
            let len = self.config.prefix_len();
            match tokio::task::spawn_blocking(move || read_prefix(&owned, len)).await {
                Ok(Ok(prefix)) => prefix,
                Ok(Err(err)) => return read_failed(folder, key, &err.to_string()),
                Err(err) => return read_failed(folder, key, &err.to_string()),
            }
        };

        let sniff_len = self.config.sniff_prefix_bytes.min(prefix.len());
        let Some(target) = classify(path, &prefix[..sniff_len], folder.media_kind) else {
            debug!(path = %key, "Unrecognized, skipping");
            outcome.skipped += 1;
            return outcome;
        };

        let fingerprint_len = self.config.fingerprint_prefix_bytes.min(prefix.len());
        let fingerprint = Fingerprint::compute(&prefix[..fingerprint_len], meta.len());
        let cache_key = CacheKey::new(fingerprint.clone(), target);

        // A changed or force-refreshed file is re-read even when its
        // fingerprint matches an earlier extraction
        if existing.is_some() {
            self.cache.invalidate(&cache_key);
        }

        let extraction = match self.extract(&cache_key, path).await {
            Ok(extraction) => extraction,
            Err(err) => {
                warn!(path = %key, error = %err, "Transient read failure, will retry next scan");
                return read_failed(folder, key, &err.to_string());
            }
        };

        let derived = derive_title(path);
        let mut record = extraction.record().cloned();
        if let (Some(MetadataRecord::Video(video)), Some(year)) = (record.as_mut(), derived.year) {
            if video.release_date.is_none() {
                video.release_date = Some(year.to_string());
            }
        }
        let title = record
            .as_ref()
            .and_then(MetadataRecord::title)
            .map_or(derived.title, str::to_string);

        let upsert = UpsertMediaItem {
            library_folder_id: folder.id,
            media_kind: folder.media_kind,
            title,
            file_path: key.to_string(),
            file_size,
            file_mtime,
            fingerprint: Some(fingerprint.into_string()),
        };

        match self.store.upsert_item(upsert, record).await {
            Ok(item) => {
                if existing.is_some() {
                    debug!(path = %key, item_id = item.id, "Updated");
                    outcome.updated += 1;
                } else {
                    debug!(path = %key, item_id = item.id, title = %item.title, "Added");
                    outcome.added += 1;
                }
                if let ExtractionOutcome::Failed { reason } = extraction {
                    warn!(path = %key, reason = %reason, "Cataloged without metadata");
                    outcome.push_issue(key, IssueKind::ExtractionFailed, reason);
                }
                outcome
            }
            Err(AyiahError::Duplicate(reason)) => {
                debug!(path = %key, reason = %reason, "Path claimed concurrently by another folder");
                outcome.skipped += 1;
                outcome
            }
            Err(err) => store_failed(folder, key, &err),
        }
    }

    /// Run the extractor behind the cache, on the blocking pool
    async fn extract(&self, key: &CacheKey, path: &Path) -> Result<ExtractionOutcome, MetadataError> {
        let extractor = Arc::clone(&self.extractor);
        let owned = path.to_path_buf();
        let target = key.target;

        self.cache
            .get_or_extract(key, || async move {
                match tokio::task::spawn_blocking(move || extractor.extract(&owned, target)).await {
                    Ok(result) => result,
                    Err(err) => Ok(ExtractionOutcome::Failed {
                        reason: format!("extractor panicked: {err}"),
                    }),
                }
            })
            .await
    }

    /// Walk a directory that appeared under the folder and reconcile each file
    async fn reconcile_directory(&self, folder: &LibraryFolder, dir: &Path) -> ScanOutcome {
        let walker = FolderWalker::new(dir, &self.config);
        let entries = match tokio::task::spawn_blocking(move || walker.walk().collect::<Vec<_>>()).await {
            Ok(entries) => entries,
            Err(err) => return read_failed(folder, &path_key(dir), &err.to_string()),
        };

        let mut outcome = ScanOutcome::new(folder.id);
        for entry in entries {
            match entry {
                WalkEntry::File { path, .. } => {
                    outcome.merge(self.reconcile_file(folder, &canonical_path(&path)).await);
                }
                WalkEntry::Failed { path, message } => {
                    outcome.errored += 1;
                    outcome.push_issue(path_key(&path), IssueKind::WalkFailed, message);
                }
            }
        }
        outcome
    }

    /// The path vanished: drop its item, or every item below it
    async fn remove_missing(&self, folder: &LibraryFolder, key: &str) -> ScanOutcome {
        let mut outcome = ScanOutcome::new(folder.id);

        match self.store.get_item_by_path(key).await {
            Ok(Some(item)) if item.library_folder_id == folder.id => {
                outcome.merge(self.delete(folder, &item).await);
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                let prefix = format!("{}{}", key.trim_end_matches(MAIN_SEPARATOR), MAIN_SEPARATOR);
                let items = match self.store.list_items(folder.id).await {
                    Ok(items) => items,
                    Err(err) => return store_failed(folder, key, &err),
                };
                for item in items.iter().filter(|item| item.file_path.starts_with(&prefix)) {
                    let _lock = self.lock_path(&item.file_path).await;
                    outcome.merge(self.delete(folder, item).await);
                }
            }
            Err(err) => return store_failed(folder, key, &err),
        }

        outcome
    }

    /// Removal pass entry: delete `item` unless its file is still a candidate
    ///
    /// The file may have reappeared (e.g. through a watcher event) since the
    /// walk snapshot was taken; such items are kept and not counted.
    pub(crate) async fn remove_if_stale(
        &self,
        folder: &LibraryFolder,
        walker: &FolderWalker,
        item: &MediaItem,
    ) -> ScanOutcome {
        let _lock = self.lock_path(&item.file_path).await;
        let path = Path::new(&item.file_path);

        let still_candidate = match tokio::fs::metadata(path).await {
            Ok(meta) => {
                meta.is_file()
                    && meta.len() >= walker.min_file_size()
                    && !walker.is_excluded(path)
            }
            Err(_) => false,
        };

        if still_candidate {
            debug!(path = %item.file_path, "Reappeared since the walk, keeping");
            return ScanOutcome::new(folder.id);
        }

        self.delete(folder, item).await
    }

    async fn delete(&self, folder: &LibraryFolder, item: &MediaItem) -> ScanOutcome {
        let mut outcome = ScanOutcome::new(folder.id);
        match self.store.delete_item(item.id).await {
            Ok(()) | Err(AyiahError::MediaItemNotFound(_)) => {
                debug!(path = %item.file_path, item_id = item.id, "Removed");
                outcome.removed += 1;
            }
            Err(err) => {
                warn!(path = %item.file_path, error = %err, "Failed to remove item");
                outcome.errored += 1;
                outcome.push_issue(&item.file_path, IssueKind::StoreFailed, err.to_string());
            }
        }
        outcome
    }

    /// Serialize catalog writes for one path
    async fn lock_path(&self, key: &str) -> PathLock<'_> {
        let mutex = Arc::clone(self.path_locks.entry(key.to_string()).or_default().value());
        let guard = mutex.lock_owned().await;
        PathLock {
            locks: &self.path_locks,
            key: key.to_string(),
            guard: Some(guard),
        }
    }
}

/// Held while a path is being reconciled; prunes its map entry on release
struct PathLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Resolve symlinks; for a path that no longer exists, resolve its parent
pub fn canonical_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map_or_else(|_| path.to_path_buf(), |parent| parent.join(name)),
        _ => path.to_path_buf(),
    }
}

pub(crate) fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Modification time in Unix epoch milliseconds (0 when unavailable)
fn mtime_millis(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis() as i64)
}

fn read_failed(folder: &LibraryFolder, key: &str, message: &str) -> ScanOutcome {
    warn!(path = %key, folder_id = folder.id, error = %message, "Failed to read file");
    let mut outcome = ScanOutcome::new(folder.id);
    outcome.errored += 1;
    outcome.push_issue(key, IssueKind::ReadFailed, message);
    outcome
}

fn store_failed(folder: &LibraryFolder, key: &str, err: &AyiahError) -> ScanOutcome {
    warn!(path = %key, folder_id = folder.id, error = %err, "Catalog rejected write");
    let mut outcome = ScanOutcome::new(folder.id);
    outcome.errored += 1;
    outcome.push_issue(key, IssueKind::StoreFailed, err.to_string());
    outcome
}
