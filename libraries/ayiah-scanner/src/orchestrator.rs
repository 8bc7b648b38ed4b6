//! Scan orchestration
//!
//! One scan per folder at a time: a second `scan` for a folder that is
//! already being scanned attaches to the running scan and receives the same
//! outcome. File-level work from every folder shares one bounded worker
//! pool, so a large folder cannot starve the others.

use crate::error::{Result, ScanError};
use crate::reconciler::{canonical_path, path_key, Reconciler};
use crate::walker::{FolderWalker, WalkEntry};
use ayiah_core::types::{FolderId, IssueKind, LibraryFolder, ScanOutcome};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Walk entries buffered between the blocking walker and the scan loop
const WALK_BUFFER: usize = 256;

type SharedScan = Shared<BoxFuture<'static, Result<ScanOutcome>>>;

struct InFlight {
    scan: SharedScan,
    cancel: CancellationToken,
}

/// Per-folder single-flight scans over a shared worker pool
pub struct ScanOrchestrator {
    reconciler: Arc<Reconciler>,
    workers: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<FolderId, InFlight>>>,
}

impl ScanOrchestrator {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        let workers = reconciler.config().worker_count();
        Self {
            reconciler,
            workers: Arc::new(Semaphore::new(workers)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Scan one folder
    ///
    /// Fails with `FolderNotFound` for an unknown id and `FolderDisabled` for
    /// a disabled folder; everything below the folder level is counted in
    /// the outcome instead.
    pub async fn scan(&self, folder_id: FolderId) -> Result<ScanOutcome> {
        let folder = self
            .reconciler
            .store()
            .get_folder(folder_id)
            .await?
            .ok_or(ScanError::FolderNotFound(folder_id))?;

        if !folder.enabled {
            return Err(ScanError::FolderDisabled(folder_id));
        }

        self.scan_folder(folder).await
    }

    /// Scan every enabled folder concurrently
    ///
    /// A failing folder never aborts its siblings; each gets its own result.
    pub async fn scan_all(&self) -> Result<Vec<(FolderId, Result<ScanOutcome>)>> {
        let folders = self.reconciler.store().list_enabled_folders().await?;
        info!("Scanning {} enabled folders", folders.len());

        let scans = folders.into_iter().map(|folder| {
            let id = folder.id;
            self.scan_folder(folder).map(move |result| {
                if let Err(e) = &result {
                    error!(folder_id = id, error = %e, "Folder scan failed");
                }
                (id, result)
            })
        });

        Ok(futures::future::join_all(scans).await)
    }

    /// Request cooperative cancellation of a running scan
    ///
    /// Returns `false` when no scan is running for the folder.
    pub fn cancel(&self, folder_id: FolderId) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        match in_flight.get(&folder_id) {
            Some(running) => {
                info!(folder_id, "Cancelling scan");
                running.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_scanning(&self, folder_id: FolderId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&folder_id)
    }

    /// Reconcile a single path of `folder` on the shared worker pool
    pub async fn reconcile_path(&self, folder: &LibraryFolder, path: &Path) -> Result<ScanOutcome> {
        let _permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| ScanError::Aborted(e.to_string()))?;
        Ok(self.reconciler.reconcile_path(folder, path).await)
    }

    /// Attach to the folder's running scan, or start one
    async fn scan_folder(&self, folder: LibraryFolder) -> Result<ScanOutcome> {
        let scan = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(running) = in_flight.get(&folder.id) {
                debug!(folder_id = folder.id, "Attaching to in-flight scan");
                running.scan.clone()
            } else {
                let cancel = CancellationToken::new();
                let scan = self.spawn_scan(folder.clone(), cancel.clone());
                in_flight.insert(
                    folder.id,
                    InFlight {
                        scan: scan.clone(),
                        cancel,
                    },
                );
                scan
            }
        };

        scan.await
    }

    fn spawn_scan(&self, folder: LibraryFolder, cancel: CancellationToken) -> SharedScan {
        let reconciler = Arc::clone(&self.reconciler);
        let workers = Arc::clone(&self.workers);
        let in_flight = Arc::clone(&self.in_flight);
        let folder_id = folder.id;

        let handle = tokio::spawn(async move {
            let result = run_scan(reconciler, workers, folder, cancel).await;
            in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&folder_id);
            result
        });

        async move { handle.await.unwrap_or_else(|e| Err(e.into())) }
            .boxed()
            .shared()
    }
}

/// One full walk of a folder
async fn run_scan(
    reconciler: Arc<Reconciler>,
    workers: Arc<Semaphore>,
    folder: LibraryFolder,
    cancel: CancellationToken,
) -> Result<ScanOutcome> {
    let start_time = Instant::now();

    match tokio::fs::metadata(folder.root()).await {
        Ok(meta) if meta.is_dir() => {}
        _ => {
            error!(folder_id = folder.id, path = %folder.path, "Folder root is missing");
            return Err(ScanError::FolderMissing {
                folder_id: folder.id,
                path: folder.path.clone(),
            });
        }
    }

    info!(folder_id = folder.id, name = %folder.name, path = %folder.path, "Scan started");

    let walker = FolderWalker::new(folder.root(), reconciler.config());
    let folder = Arc::new(folder);
    let mut outcome = ScanOutcome::new(folder.id);
    let mut seen: HashSet<String> = HashSet::new();
    let mut failed_subtrees: Vec<PathBuf> = Vec::new();
    let mut tasks = JoinSet::new();

    let mut entries = spawn_walk(walker.clone(), cancel.clone());

    loop {
        let entry = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                outcome.partial = true;
                break;
            }
            entry = entries.recv() => match entry {
                Some(entry) => entry,
                None => break,
            },
        };

        let path = match entry {
            WalkEntry::File { path, .. } => path,
            WalkEntry::Failed { path, message } => {
                outcome.errored += 1;
                outcome.push_issue(path_key(&path), IssueKind::WalkFailed, message);
                failed_subtrees.push(path);
                continue;
            }
        };

        let canonical = canonical_path(&path);
        if !seen.insert(path_key(&canonical)) {
            debug!(path = %path.display(), canonical = %canonical.display(), "Duplicate of an earlier path");
            outcome.skipped += 1;
            continue;
        }

        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                outcome.partial = true;
                break;
            }
            permit = Arc::clone(&workers).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(e) => return Err(ScanError::Aborted(e.to_string())),
            },
        };

        let reconciler = Arc::clone(&reconciler);
        let task_folder = Arc::clone(&folder);
        tasks.spawn(async move {
            let _permit = permit;
            reconciler.reconcile_file(&task_folder, &canonical).await
        });

        // Fold finished work in as we go
        while let Some(done) = tasks.try_join_next() {
            merge_task(&mut outcome, done, &folder);
        }
    }

    // In-flight files always run to completion
    while let Some(done) = tasks.join_next().await {
        merge_task(&mut outcome, done, &folder);
    }

    if outcome.partial {
        info!(folder_id = folder.id, "Scan cancelled, skipping removal pass");
    } else {
        remove_stale(&reconciler, &folder, &walker, &seen, &failed_subtrees, &mut outcome).await;
    }

    info!(
        folder_id = folder.id,
        added = outcome.added,
        updated = outcome.updated,
        skipped = outcome.skipped,
        errored = outcome.errored,
        removed = outcome.removed,
        partial = outcome.partial,
        elapsed = ?start_time.elapsed(),
        "Scan completed"
    );

    Ok(outcome)
}

/// Run the blocking walker on its own thread, streaming entries back
fn spawn_walk(walker: FolderWalker, cancel: CancellationToken) -> mpsc::Receiver<WalkEntry> {
    let (tx, rx) = mpsc::channel(WALK_BUFFER);
    tokio::task::spawn_blocking(move || {
        for entry in walker.walk() {
            if cancel.is_cancelled() || tx.blocking_send(entry).is_err() {
                break;
            }
        }
    });
    rx
}

fn merge_task(
    outcome: &mut ScanOutcome,
    done: std::result::Result<ScanOutcome, tokio::task::JoinError>,
    folder: &LibraryFolder,
) {
    match done {
        Ok(file_outcome) => outcome.merge(file_outcome),
        Err(e) => {
            warn!(folder_id = folder.id, error = %e, "Reconciliation task failed");
            outcome.errored += 1;
            outcome.push_issue(&folder.path, IssueKind::ReadFailed, e.to_string());
        }
    }
}

/// Delete items whose paths were not part of this walk
///
/// Items below a subtree that failed to walk are left alone: their absence
/// from the walk says nothing about the files.
async fn remove_stale(
    reconciler: &Reconciler,
    folder: &LibraryFolder,
    walker: &FolderWalker,
    seen: &HashSet<String>,
    failed_subtrees: &[PathBuf],
    outcome: &mut ScanOutcome,
) {
    let items = match reconciler.store().list_items(folder.id).await {
        Ok(items) => items,
        Err(e) => {
            warn!(folder_id = folder.id, error = %e, "Failed to list items for removal pass");
            outcome.push_issue(&folder.path, IssueKind::StoreFailed, e.to_string());
            return;
        }
    };

    for item in items {
        if seen.contains(&item.file_path) {
            continue;
        }
        let path = Path::new(&item.file_path);
        if failed_subtrees.iter().any(|failed| path.starts_with(failed)) {
            continue;
        }
        outcome.merge(reconciler.remove_if_stale(folder, walker, &item).await);
    }
}
