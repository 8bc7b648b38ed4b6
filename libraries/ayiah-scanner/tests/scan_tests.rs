//! Integration tests for folder scans


use ayiah_core::types::{IssueKind, MediaKind, MetadataRecord, UpsertMediaItem};
use ayiah_core::{AyiahError, CatalogStore};
use ayiah_scanner::{ScanError, ScannerConfig};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use test_helpers::*;

/// 3 valid videos, 1 corrupt video, 1 unrecognized file
fn mixed_library() -> TestLibrary {
    let library = TestLibrary::new();
    write_mkv(&library, "Heat (1995).mkv", "Heat");
    write_mkv(&library, "Ronin.mkv", "Ronin");
    write_mkv(&library, "Collateral/Collateral.mkv", "Collateral");
    write(&library.path("broken.mkv"), &corrupt_mkv());
    write(&library.path("notes.txt"), &[b'x'; 4096]);
    library
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_folder_outcome() {
    let db = TestDb::new().await;
    let library = mixed_library();
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let engine = engine(&db, CountingExtractor::new(), test_config());

    let outcome = engine.scan(folder.id).await.unwrap();

    assert_eq!(outcome.added, 4, "corrupt file is still cataloged");
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.errored, 0);
    assert_eq!(outcome.removed, 0);
    assert_eq!(outcome.updated, 0);
    assert_eq!(outcome.total(), 5);
    assert!(!outcome.partial);

    let warnings: Vec<_> = outcome
        .issues
        .iter()
        .filter(|i| i.kind == IssueKind::ExtractionFailed)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path, library.key("broken.mkv"));

    let catalog = db.catalog();
    let broken = catalog
        .get_item_by_path(&library.key("broken.mkv"))
        .await
        .unwrap()
        .expect("corrupt file cataloged");
    assert_eq!(broken.title, "broken");
    assert!(catalog.get_metadata(broken.id).await.unwrap().is_none());

    let heat = catalog
        .get_item_by_path(&library.key("Heat (1995).mkv"))
        .await
        .unwrap()
        .expect("valid file cataloged");
    assert_eq!(heat.title, "Heat");
    assert!(heat.fingerprint.is_some());
    let Some(MetadataRecord::Video(video)) = catalog.get_metadata(heat.id).await.unwrap() else {
        panic!("expected a video record");
    };
    assert_eq!(video.runtime, Some(95));
    assert_eq!(video.release_date.as_deref(), Some("1995"));

    assert!(catalog
        .get_item_by_path(&library.key("notes.txt"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rescan_is_idempotent() {
    let db = TestDb::new().await;
    let library = mixed_library();
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let extractor = CountingExtractor::new();
    let engine = engine(&db, Arc::clone(&extractor), test_config());

    engine.scan(folder.id).await.unwrap();
    let calls_after_first = extractor.calls();

    let second = engine.scan(folder.id).await.unwrap();
    assert_eq!(second.added, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.removed, 0);
    assert_eq!(second.skipped, 5);
    assert!(second.is_noop());
    assert_eq!(extractor.calls(), calls_after_first, "unchanged files are not re-extracted");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_changed_file_is_updated() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    let path = write_mkv(&library, "Thief.mkv", "Thief");
    write_mkv(&library, "Manhunter.mkv", "Manhunter");
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let engine = engine(&db, CountingExtractor::new(), test_config());

    engine.scan(folder.id).await.unwrap();

    write(&path, &mkv("Thief (Director's Cut)"));
    let outcome = engine.scan(folder.id).await.unwrap();

    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.added, 0);

    let item = db
        .catalog()
        .get_item_by_path(&library.key("Thief.mkv"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.title, "Thief (Director's Cut)");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_force_refresh_reextracts_unchanged_files() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    write_mkv(&library, "Heat.mkv", "Heat");
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let config = ScannerConfig {
        force_refresh: true,
        ..test_config()
    };
    let extractor = CountingExtractor::new();
    let engine = engine(&db, Arc::clone(&extractor), config);

    engine.scan(folder.id).await.unwrap();
    let outcome = engine.scan(folder.id).await.unwrap();
    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(extractor.calls(), 2, "unchanged file extracted again, not served from cache");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_changed_file_with_same_fingerprint_is_reextracted() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    let path = write_mkv(&library, "Heat.mkv", "Heat");
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let config = ScannerConfig {
        fingerprint_prefix_bytes: 16,
        ..test_config()
    };
    let extractor = CountingExtractor::new();
    let engine = engine(&db, Arc::clone(&extractor), config);

    engine.scan(folder.id).await.unwrap();

    // Same size and same leading bytes, newer mtime
    let mut bytes = std::fs::read(&path).unwrap();
    *bytes.last_mut().unwrap() = 0xFF;
    std::fs::write(&path, &bytes).unwrap();
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();

    let outcome = engine.scan(folder.id).await.unwrap();
    assert_eq!(outcome.updated, 1);
    assert_eq!(extractor.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_identical_pdf_in_comic_and_book_folders() {
    let db = TestDb::new().await;
    let comics = TestLibrary::new();
    let books = TestLibrary::new();
    let saga = pdf("Saga", "Brian K. Vaughan");
    write(&comics.path("saga.pdf"), &saga);
    write(&books.path("saga.pdf"), &saga);
    let comic_folder = create_folder(&db.pool, &comics.root, MediaKind::Comic).await;
    let book_folder = create_folder(&db.pool, &books.root, MediaKind::Book).await;
    let extractor = CountingExtractor::new();
    let engine = engine(&db, Arc::clone(&extractor), test_config());

    let comic_outcome = engine.scan(comic_folder.id).await.unwrap();
    assert_eq!(comic_outcome.added, 1);
    assert_eq!(comic_outcome.errored, 0);

    let book_outcome = engine.scan(book_folder.id).await.unwrap();
    assert_eq!(book_outcome.added, 1);
    assert_eq!(book_outcome.errored, 0, "issues: {:?}", book_outcome.issues);
    assert_eq!(extractor.calls(), 2);

    let catalog = db.catalog();
    let book = catalog
        .get_item_by_path(&books.key("saga.pdf"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(book.media_kind, MediaKind::Book);
    let Some(MetadataRecord::Book(record)) = catalog.get_metadata(book.id).await.unwrap() else {
        panic!("expected a book record");
    };
    assert_eq!(record.authors, vec!["Brian K. Vaughan"]);

    let comic = catalog
        .get_item_by_path(&comics.key("saga.pdf"))
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        catalog.get_metadata(comic.id).await.unwrap(),
        Some(MetadataRecord::Comic(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deleted_file_is_removed_with_its_metadata() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    let doomed = write_mkv(&library, "Heat.mkv", "Heat");
    write_mkv(&library, "Ronin.mkv", "Ronin");
    write_mkv(&library, "Thief.mkv", "Thief");
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let engine = engine(&db, CountingExtractor::new(), test_config());

    engine.scan(folder.id).await.unwrap();
    let catalog = db.catalog();
    let before = catalog.list_items(folder.id).await.unwrap();
    let doomed_item = catalog
        .get_item_by_path(&library.key("Heat.mkv"))
        .await
        .unwrap()
        .unwrap();
    assert!(catalog.get_metadata(doomed_item.id).await.unwrap().is_some());

    std::fs::remove_file(&doomed).unwrap();
    let outcome = engine.scan(folder.id).await.unwrap();

    assert_eq!(outcome.removed, 1);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.added + outcome.updated, 0);

    let after = catalog.list_items(folder.id).await.unwrap();
    assert_eq!(after.len(), 2);
    assert!(catalog.get_metadata(doomed_item.id).await.unwrap().is_none());
    for item in &after {
        let original = before.iter().find(|b| b.id == item.id).expect("sibling kept");
        assert_eq!(original, item, "siblings untouched");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scans_share_one_walk() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    for title in ["Heat", "Ronin", "Thief"] {
        write_mkv(&library, &format!("{title}.mkv"), title);
    }
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let extractor = CountingExtractor::slow(Duration::from_millis(200));
    let engine = engine(&db, Arc::clone(&extractor), test_config());

    let (a, b) = tokio::join!(engine.scan(folder.id), engine.scan(folder.id));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a, b, "second caller attached to the first scan");
    assert_eq!(a.added, 3);
    assert_eq!(extractor.calls(), 3);
    assert_eq!(db.catalog().list_items(folder.id).await.unwrap().len(), 3);
    assert!(!engine.is_scanning(folder.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_identical_files_extract_once() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    write_mkv(&library, "Heat.mkv", "Heat");
    write_mkv(&library, "backup/Heat copy.mkv", "Heat");
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let extractor = CountingExtractor::new();
    let engine = engine(&db, Arc::clone(&extractor), test_config());

    let outcome = engine.scan(folder.id).await.unwrap();

    assert_eq!(outcome.added, 2);
    assert_eq!(extractor.calls(), 1);
    assert_eq!(engine.cache().stats().hits, 1);

    let catalog = db.catalog();
    let copy = catalog
        .get_item_by_path(&library.key("backup/Heat copy.mkv"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(copy.title, "Heat", "extracted title wins over the file name");
}

#[tokio::test]
async fn test_scan_unknown_or_disabled_folder() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let engine = engine(&db, CountingExtractor::new(), test_config());

    assert!(matches!(engine.scan(9999).await, Err(ScanError::FolderNotFound(9999))));

    ayiah_storage::library_folders::set_enabled(&db.pool, folder.id, false)
        .await
        .unwrap();
    assert!(matches!(
        engine.scan(folder.id).await,
        Err(ScanError::FolderDisabled(id)) if id == folder.id
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scan_all_isolates_missing_folders() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    write_mkv(&library, "Heat.mkv", "Heat");
    let present = create_folder(&db.pool, &library.root, MediaKind::Movie).await;

    let gone = TestLibrary::new();
    let missing = create_folder(&db.pool, &gone.root, MediaKind::Tv).await;
    std::fs::remove_dir_all(&gone.root).unwrap();

    let engine = engine(&db, CountingExtractor::new(), test_config());
    let results = engine.scan_all().await.unwrap();
    assert_eq!(results.len(), 2);

    for (folder_id, result) in results {
        if folder_id == present.id {
            assert_eq!(result.unwrap().added, 1);
        } else {
            assert_eq!(folder_id, missing.id);
            assert!(matches!(result, Err(ScanError::FolderMissing { .. })));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_nested_folders_first_claim_wins() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    write_mkv(&library, "Heat.mkv", "Heat");
    write_mkv(&library, "shows/Pilot.mkv", "Pilot");

    let outer = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let inner = create_folder(&db.pool, &library.path("shows"), MediaKind::Tv).await;
    let engine = engine(&db, CountingExtractor::new(), test_config());

    let first = engine.scan(outer.id).await.unwrap();
    assert_eq!(first.added, 2);

    let second = engine.scan(inner.id).await.unwrap();
    assert_eq!(second.added, 0);
    assert_eq!(second.skipped, 1, "path already claimed by the outer folder");
    assert_eq!(second.errored, 0);

    let catalog = db.catalog();
    let pilot = catalog
        .get_item_by_path(&library.key("shows/Pilot.mkv"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pilot.library_folder_id, outer.id);
    assert_eq!(pilot.media_kind, MediaKind::Movie);
    assert!(catalog.list_items(inner.id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_formats_outside_folder_kind_are_skipped() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    write_mkv(&library, "Heat.mkv", "Heat");
    let folder = create_folder(&db.pool, &library.root, MediaKind::Comic).await;
    let engine = engine(&db, CountingExtractor::new(), test_config());

    let outcome = engine.scan(folder.id).await.unwrap();
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.added, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_small_and_hidden_files_are_not_candidates() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    write_mkv(&library, "Heat.mkv", "Heat");
    write(&library.path("sample.mkv"), &[0x1A, 0x45, 0xDF, 0xA3, 0, 0]);
    write_mkv(&library, ".trash/Old.mkv", "Old");
    write_mkv(&library, "@eaDir/Heat.mkv", "Thumb");
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let engine = engine(&db, CountingExtractor::new(), test_config());

    let outcome = engine.scan(folder.id).await.unwrap();
    assert_eq!(outcome.total(), 1);
    assert_eq!(outcome.added, 1);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_symlinked_duplicate_is_skipped() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    write_mkv(&library, "Heat.mkv", "Heat");
    std::os::unix::fs::symlink(library.path("Heat.mkv"), library.path("Heat link.mkv")).unwrap();
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;
    let engine = engine(&db, CountingExtractor::new(), test_config());

    let outcome = engine.scan(folder.id).await.unwrap();
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.skipped, 1);

    let items = db.catalog().list_items(folder.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].file_path, library.key("Heat.mkv"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_scan_is_partial() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    for i in 0..10 {
        write_mkv(&library, &format!("Episode {i:02}.mkv"), &format!("Episode {i}"));
    }
    let folder = create_folder(&db.pool, &library.root, MediaKind::Tv).await;
    let config = ScannerConfig {
        workers: 1,
        ..test_config()
    };
    let engine = Arc::new(engine(&db, CountingExtractor::slow(Duration::from_millis(100)), config));

    let folder_id = folder.id;
    let scan = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.scan(folder_id).await })
    };
    let started = eventually(Duration::from_secs(5), || {
        let engine = Arc::clone(&engine);
        async move { engine.is_scanning(folder_id) }
    })
    .await;
    assert!(started);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(engine.cancel(folder_id));

    let outcome = scan.await.unwrap().unwrap();
    assert!(outcome.partial);
    assert!(outcome.added < 10);
    assert_eq!(outcome.removed, 0);

    let cataloged = db.catalog().list_items(folder_id).await.unwrap().len() as u64;
    assert_eq!(cataloged, outcome.added, "no half-finished writes");
    assert!(!engine.cancel(folder_id));

    // A later full scan picks up the rest
    let rest = engine.scan(folder_id).await.unwrap();
    assert!(!rest.partial);
    assert_eq!(rest.added + outcome.added, 10);
}

/// Catalog that rejects writes for one path
struct RejectingCatalog {
    inner: Arc<dyn CatalogStore>,
    rejected: String,
}

#[async_trait::async_trait]
impl CatalogStore for RejectingCatalog {
    async fn get_folder(
        &self,
        id: ayiah_core::FolderId,
    ) -> ayiah_core::Result<Option<ayiah_core::LibraryFolder>> {
        self.inner.get_folder(id).await
    }

    async fn list_enabled_folders(&self) -> ayiah_core::Result<Vec<ayiah_core::LibraryFolder>> {
        self.inner.list_enabled_folders().await
    }

    async fn get_item_by_path(&self, path: &str) -> ayiah_core::Result<Option<ayiah_core::MediaItem>> {
        self.inner.get_item_by_path(path).await
    }

    async fn upsert_item(
        &self,
        item: UpsertMediaItem,
        metadata: Option<MetadataRecord>,
    ) -> ayiah_core::Result<ayiah_core::MediaItem> {
        if item.file_path == self.rejected {
            return Err(AyiahError::Database("disk I/O error".into()));
        }
        self.inner.upsert_item(item, metadata).await
    }

    async fn delete_item(&self, id: ayiah_core::MediaItemId) -> ayiah_core::Result<()> {
        self.inner.delete_item(id).await
    }

    async fn list_items(
        &self,
        folder_id: ayiah_core::FolderId,
    ) -> ayiah_core::Result<Vec<ayiah_core::MediaItem>> {
        self.inner.list_items(folder_id).await
    }

    async fn get_metadata(
        &self,
        item_id: ayiah_core::MediaItemId,
    ) -> ayiah_core::Result<Option<MetadataRecord>> {
        self.inner.get_metadata(item_id).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_store_failure_counts_as_errored_and_scan_continues() {
    let db = TestDb::new().await;
    let library = TestLibrary::new();
    write_mkv(&library, "Heat.mkv", "Heat");
    write_mkv(&library, "Ronin.mkv", "Ronin");
    let folder = create_folder(&db.pool, &library.root, MediaKind::Movie).await;

    let catalog = Arc::new(RejectingCatalog {
        inner: db.catalog(),
        rejected: library.key("Ronin.mkv"),
    });
    let config = test_config();
    let engine = ayiah_scanner::ScanEngine::with_parts(
        catalog,
        CountingExtractor::new(),
        Arc::new(ayiah_scanner::MetadataCache::new(16)),
        config,
    );

    let outcome = engine.scan(folder.id).await.unwrap();
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.errored, 1);
    assert_eq!(outcome.total(), 2);
    assert!(outcome
        .issues
        .iter()
        .any(|i| i.kind == IssueKind::StoreFailed && i.path == library.key("Ronin.mkv")));
}
