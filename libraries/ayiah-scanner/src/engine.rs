//! Caller-facing scan engine
//!
//! Wires the cache, reconciler, orchestrator and watcher together. The
//! metadata cache is constructed by the caller (or here, once) and passed
//! down explicitly; there is no process-global state.

use crate::cache::MetadataCache;
use crate::config::ScannerConfig;
use crate::error::{Result, ScanError};
use crate::orchestrator::ScanOrchestrator;
use crate::reconciler::Reconciler;
use crate::watcher::{run_event_loop, ChangeWatcher, WatcherConfig, WatcherEvent};
use ayiah_core::types::{FolderId, LibraryFolder, ScanOutcome};
use ayiah_core::CatalogStore;
use ayiah_metadata::{MetadataExtractor, StandardExtractor};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type EventReceiver = mpsc::Receiver<(FolderId, WatcherEvent)>;

/// Library scanning engine
///
/// # Example
///
/// ```rust,no_run
/// use ayiah_scanner::{ScanEngine, ScannerConfig};
/// use ayiah_storage::SqliteCatalog;
/// use std::sync::Arc;
///
/// # async fn example(catalog: SqliteCatalog) -> Result<(), Box<dyn std::error::Error>> {
/// let engine = ScanEngine::new(Arc::new(catalog), ScannerConfig::default());
/// let outcome = engine.scan(1).await?;
/// println!("added {}, skipped {}", outcome.added, outcome.skipped);
/// # Ok(())
/// # }
/// ```
pub struct ScanEngine {
    orchestrator: Arc<ScanOrchestrator>,
    watcher: Arc<ChangeWatcher>,
    event_rx: Mutex<Option<EventReceiver>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl ScanEngine {
    /// Engine with the built-in extractors and a fresh cache
    pub fn new(store: Arc<dyn CatalogStore>, config: ScannerConfig) -> Self {
        let cache = Arc::new(MetadataCache::new(config.cache_capacity));
        Self::with_parts(store, Arc::new(StandardExtractor::new()), cache, config)
    }

    /// Engine with an explicit extractor and cache
    pub fn with_parts(
        store: Arc<dyn CatalogStore>,
        extractor: Arc<dyn MetadataExtractor>,
        cache: Arc<MetadataCache>,
        config: ScannerConfig,
    ) -> Self {
        let mut watcher = ChangeWatcher::new(WatcherConfig::from(&config));
        let event_rx = watcher.take_event_receiver();

        let reconciler = Arc::new(Reconciler::new(store, extractor, cache, Arc::new(config)));

        Self {
            orchestrator: Arc::new(ScanOrchestrator::new(reconciler)),
            watcher: Arc::new(watcher),
            event_rx: Mutex::new(event_rx),
            event_loop: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        self.orchestrator.reconciler().cache()
    }

    pub fn config(&self) -> &ScannerConfig {
        self.orchestrator.reconciler().config()
    }

    fn store(&self) -> &Arc<dyn CatalogStore> {
        self.orchestrator.reconciler().store()
    }

    // ========================================================================
    // Scanning
    // ========================================================================

    /// Scan one folder (single-flight per folder)
    pub async fn scan(&self, folder_id: FolderId) -> Result<ScanOutcome> {
        self.orchestrator.scan(folder_id).await
    }

    /// Scan every enabled folder; per-folder failures are returned, not raised
    pub async fn scan_all(&self) -> Result<Vec<(FolderId, Result<ScanOutcome>)>> {
        self.orchestrator.scan_all().await
    }

    /// Cooperatively cancel a running scan
    pub fn cancel(&self, folder_id: FolderId) -> bool {
        self.orchestrator.cancel(folder_id)
    }

    pub fn is_scanning(&self, folder_id: FolderId) -> bool {
        self.orchestrator.is_scanning(folder_id)
    }

    /// Reconcile the paths named by one change event right away
    ///
    /// This is the same path the watcher takes, minus the queue.
    pub async fn handle_event(&self, folder_id: FolderId, event: WatcherEvent) -> Result<ScanOutcome> {
        let folder = self.enabled_folder(folder_id).await?;
        let mut outcome = ScanOutcome::new(folder_id);
        for path in event.paths() {
            outcome.merge(self.orchestrator.reconcile_path(&folder, path).await?);
        }
        Ok(outcome)
    }

    // ========================================================================
    // Watching
    // ========================================================================

    /// Start watching a folder; a no-op (`Ok(false)`) if already watched
    pub async fn start_watch(&self, folder_id: FolderId) -> Result<bool> {
        let folder = self.enabled_folder(folder_id).await?;
        self.ensure_event_loop();
        self.watcher.watch_folder(&folder).await
    }

    /// Stop watching a folder; a no-op (`false`) if it was not watched
    pub async fn stop_watch(&self, folder_id: FolderId) -> bool {
        self.watcher.unwatch_folder(folder_id).await
    }

    pub async fn is_watching(&self, folder_id: FolderId) -> bool {
        self.watcher.is_watching(folder_id).await
    }

    /// Start watching every enabled folder
    pub async fn watch_all(&self) -> Result<Vec<(FolderId, Result<bool>)>> {
        let folders = self.store().list_enabled_folders().await?;
        let mut results = Vec::with_capacity(folders.len());
        for folder in folders {
            let result = self.start_watch(folder.id).await;
            if let Err(e) = &result {
                warn!(folder_id = folder.id, error = %e, "Failed to start watch");
            }
            results.push((folder.id, result));
        }
        Ok(results)
    }

    /// Stop all watches and the event loop
    pub async fn shutdown(&self) {
        self.watcher.stop_watching().await;
        self.shutdown.cancel();
        let handle = self
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("Scan engine stopped");
    }

    async fn enabled_folder(&self, folder_id: FolderId) -> Result<LibraryFolder> {
        let folder = self
            .store()
            .get_folder(folder_id)
            .await?
            .ok_or(ScanError::FolderNotFound(folder_id))?;
        if !folder.enabled {
            return Err(ScanError::FolderDisabled(folder_id));
        }
        Ok(folder)
    }

    /// Spawn the event loop on first use
    fn ensure_event_loop(&self) {
        let mut event_loop = self.event_loop.lock().unwrap_or_else(PoisonError::into_inner);
        if event_loop.is_some() {
            return;
        }
        let Some(event_rx) = self
            .event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        *event_loop = Some(tokio::spawn(run_event_loop(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.watcher),
            event_rx,
            self.shutdown.clone(),
        )));
    }
}

impl Drop for ScanEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
