//! Filesystem watcher for library folders
//!
//! Watches enabled folder roots and feeds debounced change events through a
//! bounded channel into the reconciler's single-path entry point. When the
//! channel is full the event is dropped and the folder is flagged for a full
//! rescan instead. Lost subscriptions are re-established with exponential
//! backoff, followed by a rescan to pick up what was missed.

use crate::config::ScannerConfig;
use crate::error::{Result, ScanError};
use crate::orchestrator::ScanOrchestrator;
use ayiah_core::types::{FolderId, LibraryFolder};
use dashmap::DashSet;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// File system event types we care about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    /// File or directory was created
    Created(PathBuf),
    /// File was modified
    Modified(PathBuf),
    /// File or directory was removed
    Removed(PathBuf),
    /// File or directory was renamed (old path, new path)
    Renamed(PathBuf, PathBuf),
}

impl WatcherEvent {
    /// Paths to reconcile, in order
    ///
    /// A rename is a removal at the old path followed by an addition at the
    /// new one.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Removed(p) => vec![p.as_path()],
            Self::Renamed(from, to) => vec![from.as_path(), to.as_path()],
        }
    }
}

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Per-path coalescing window
    pub debounce_duration: Duration,
    /// Events buffered before the drop-and-rescan policy kicks in
    pub queue_capacity: usize,
    /// First re-subscription delay
    pub initial_backoff: Duration,
    /// Cap for the re-subscription delay
    pub max_backoff: Duration,
}

impl From<&ScannerConfig> for WatcherConfig {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            debounce_duration: config.debounce(),
            queue_capacity: config.watch_queue_capacity.max(1),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::from(&ScannerConfig::default())
    }
}

/// Handle for a watched folder
///
/// `debouncer` is `None` while the subscription is lost and awaiting
/// re-subscription.
struct WatcherHandle {
    folder: LibraryFolder,
    debouncer: Option<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

/// Watches library folders for changes
pub struct ChangeWatcher {
    config: WatcherConfig,
    watchers: RwLock<HashMap<FolderId, WatcherHandle>>,
    event_tx: mpsc::Sender<(FolderId, WatcherEvent)>,
    event_rx: Option<mpsc::Receiver<(FolderId, WatcherEvent)>>,
    /// Folders that dropped events on a full queue
    overflowed: Arc<DashSet<FolderId>>,
    /// Folders whose subscription was lost
    lost: Arc<DashSet<FolderId>>,
}

impl ChangeWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.queue_capacity);
        Self {
            config,
            watchers: RwLock::new(HashMap::new()),
            event_tx,
            event_rx: Some(event_rx),
            overflowed: Arc::new(DashSet::new()),
            lost: Arc::new(DashSet::new()),
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Take the event receiver for processing
    ///
    /// This can only be called once.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<(FolderId, WatcherEvent)>> {
        self.event_rx.take()
    }

    /// Start watching a folder
    ///
    /// Returns `false` when the folder was already watched (no-op).
    pub async fn watch_folder(&self, folder: &LibraryFolder) -> Result<bool> {
        let mut watchers = self.watchers.write().await;
        if watchers.contains_key(&folder.id) {
            debug!(folder_id = folder.id, "Already watching");
            return Ok(false);
        }

        let debouncer = self.subscribe(folder)?;
        watchers.insert(
            folder.id,
            WatcherHandle {
                folder: folder.clone(),
                debouncer: Some(debouncer),
            },
        );

        info!(folder_id = folder.id, "Started watching: {} ({})", folder.name, folder.path);
        Ok(true)
    }

    /// Stop watching a folder
    ///
    /// Returns `false` when the folder was not watched (no-op).
    pub async fn unwatch_folder(&self, folder_id: FolderId) -> bool {
        let removed = self.watchers.write().await.remove(&folder_id);
        self.lost.remove(&folder_id);
        self.overflowed.remove(&folder_id);

        match removed {
            Some(handle) => {
                info!(folder_id, "Stopped watching: {}", handle.folder.path);
                true
            }
            None => false,
        }
    }

    /// Stop watching all folders
    pub async fn stop_watching(&self) {
        self.watchers.write().await.clear();
        self.lost.clear();
        self.overflowed.clear();
        info!("Stopped all watchers");
    }

    /// Get the number of watched folders
    pub async fn watcher_count(&self) -> usize {
        self.watchers.read().await.len()
    }

    /// Check if a specific folder is being watched
    pub async fn is_watching(&self, folder_id: FolderId) -> bool {
        self.watchers.read().await.contains_key(&folder_id)
    }

    /// Drain the folders that overflowed the event queue
    pub fn take_overflowed(&self) -> Vec<FolderId> {
        drain(&self.overflowed)
    }

    /// Folders currently waiting for re-subscription
    pub fn lost_folders(&self) -> Vec<FolderId> {
        self.lost.iter().map(|id| *id).collect()
    }

    /// Flag watched folders whose root has disappeared
    ///
    /// Some backends never report the removal of the watched directory
    /// itself, so the roots are checked directly as well.
    async fn detect_missing_roots(&self) {
        let missing: Vec<FolderId> = self
            .watchers
            .read()
            .await
            .iter()
            .filter(|(_, handle)| handle.debouncer.is_some() && !handle.folder.root().exists())
            .map(|(id, _)| *id)
            .collect();

        for folder_id in missing {
            error!(folder_id, "Folder root is gone, subscription lost");
            self.mark_lost(folder_id).await;
        }
    }

    /// Drop a folder's subscription and queue it for re-subscription
    async fn mark_lost(&self, folder_id: FolderId) {
        if let Some(handle) = self.watchers.write().await.get_mut(&folder_id) {
            handle.debouncer = None;
            self.lost.insert(folder_id);
        }
    }

    /// Replace a lost subscription with a fresh one
    pub async fn resubscribe(&self, folder_id: FolderId) -> Result<()> {
        let mut watchers = self.watchers.write().await;
        let Some(handle) = watchers.get_mut(&folder_id) else {
            self.lost.remove(&folder_id);
            return Ok(());
        };

        // Drop the old subscription before creating its replacement
        handle.debouncer = None;
        handle.debouncer = Some(self.subscribe(&handle.folder)?);
        self.lost.remove(&folder_id);

        info!(folder_id, "Re-subscribed: {}", handle.folder.path);
        Ok(())
    }

    fn subscribe(&self, folder: &LibraryFolder) -> Result<Debouncer<RecommendedWatcher, RecommendedCache>> {
        let root = std::fs::canonicalize(folder.root()).map_err(|_| ScanError::FolderMissing {
            folder_id: folder.id,
            path: folder.path.clone(),
        })?;

        let folder_id = folder.id;
        let event_tx = self.event_tx.clone();
        let overflowed = Arc::clone(&self.overflowed);
        let lost = Arc::clone(&self.lost);
        let watched_root = root.clone();

        let mut debouncer = new_debouncer(
            self.config.debounce_duration,
            None, // No tick rate
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        if is_root_removal(&event.event, &watched_root) {
                            error!(folder_id, "Folder root removed, subscription lost");
                            lost.insert(folder_id);
                            continue;
                        }
                        if let Some(watcher_event) = convert_event(&event.event) {
                            enqueue(&event_tx, &overflowed, folder_id, watcher_event);
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        error!(folder_id, "Watcher error: {:?}", error);
                        if is_subscription_lost(&error, &watched_root) {
                            lost.insert(folder_id);
                        }
                    }
                }
            },
        )
        .map_err(|e| ScanError::watch(folder_id, format!("Failed to create debouncer: {e}")))?;

        debouncer
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| ScanError::watch(folder_id, format!("Failed to watch path: {e}")))?;

        Ok(debouncer)
    }
}

/// Queue an event without blocking the notify thread
///
/// On a full queue the event is dropped and the folder flagged for a rescan.
fn enqueue(
    event_tx: &mpsc::Sender<(FolderId, WatcherEvent)>,
    overflowed: &DashSet<FolderId>,
    folder_id: FolderId,
    event: WatcherEvent,
) {
    match event_tx.try_send((folder_id, event)) {
        Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            if overflowed.insert(folder_id) {
                warn!(folder_id, "Watch queue full, folder will be rescanned");
            }
        }
    }
}

fn drain(set: &DashSet<FolderId>) -> Vec<FolderId> {
    let ids: Vec<FolderId> = set.iter().map(|id| *id).collect();
    for id in &ids {
        set.remove(id);
    }
    ids
}

/// Convert a notify event to a WatcherEvent
fn convert_event(event: &Event) -> Option<WatcherEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => paths.first().map(|p| WatcherEvent::Created(p.clone())),
        EventKind::Remove(_) => paths.first().map(|p| WatcherEvent::Removed(p.clone())),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            Some(WatcherEvent::Renamed(paths[0].clone(), paths[1].clone()))
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.first().map(|p| WatcherEvent::Removed(p.clone()))
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.first().map(|p| WatcherEvent::Created(p.clone()))
        }
        EventKind::Modify(_) => paths.first().map(|p| WatcherEvent::Modified(p.clone())),
        EventKind::Other => {
            // Handle rename events which sometimes come as Other
            if paths.len() == 2 {
                Some(WatcherEvent::Renamed(paths[0].clone(), paths[1].clone()))
            } else {
                paths.first().map(|p| WatcherEvent::Modified(p.clone()))
            }
        }
        _ => None,
    }
}

fn is_root_removal(event: &Event, root: &Path) -> bool {
    matches!(event.kind, EventKind::Remove(_)) && event.paths.iter().any(|p| p == root)
}

fn is_subscription_lost(error: &notify::Error, root: &Path) -> bool {
    matches!(
        error.kind,
        notify::ErrorKind::WatchNotFound | notify::ErrorKind::MaxFilesWatch
    ) || !root.exists()
}

/// Re-subscription schedule for one folder
struct Backoff {
    next_attempt: Instant,
    delay: Duration,
}

/// Run the event processing loop
///
/// Runs until `shutdown` is cancelled or every sender is gone. Events are
/// reconciled one at a time on the orchestrator's shared worker pool, so a
/// burst backs up in the bounded queue and overflows into a full
/// (single-flight) rescan of the folder.
pub async fn run_event_loop(
    orchestrator: Arc<ScanOrchestrator>,
    watcher: Arc<ChangeWatcher>,
    mut event_rx: mpsc::Receiver<(FolderId, WatcherEvent)>,
    shutdown: CancellationToken,
) {
    let config = watcher.config().clone();
    let mut backoff: HashMap<FolderId, Backoff> = HashMap::new();
    let mut maintenance = tokio::time::interval(config.initial_backoff);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            received = event_rx.recv() => {
                let Some((folder_id, event)) = received else { break };
                dispatch_event(&orchestrator, &watcher, folder_id, event).await;
            }
            _ = maintenance.tick() => {
                watcher.detect_missing_roots().await;
                rescan_overflowed(&orchestrator, &watcher);
                resubscribe_lost(&orchestrator, &watcher, &config, &mut backoff).await;
            }
        }
    }

    debug!("Watcher event loop stopped");
}

async fn dispatch_event(
    orchestrator: &ScanOrchestrator,
    watcher: &ChangeWatcher,
    folder_id: FolderId,
    event: WatcherEvent,
) {
    if !watcher.is_watching(folder_id).await {
        debug!(folder_id, "Event for a folder no longer watched, dropping");
        return;
    }

    // The folder may have been disabled or deleted since the watch started
    let folder = match orchestrator.reconciler().store().get_folder(folder_id).await {
        Ok(Some(folder)) if folder.enabled => folder,
        Ok(_) => {
            info!(folder_id, "Folder disabled or deleted, stopping its watch");
            watcher.unwatch_folder(folder_id).await;
            return;
        }
        Err(e) => {
            error!(folder_id, error = %e, "Failed to load folder, dropping event");
            return;
        }
    };

    debug!("Processing event for folder {}: {:?}", folder_id, event);
    for path in event.paths() {
        match orchestrator.reconcile_path(&folder, path).await {
            Ok(outcome) => debug!(
                folder_id,
                path = %path.display(),
                added = outcome.added,
                updated = outcome.updated,
                skipped = outcome.skipped,
                removed = outcome.removed,
                errored = outcome.errored,
                "Reconciled watched path"
            ),
            Err(e) => error!(folder_id, path = %path.display(), error = %e, "Failed to process event"),
        }
    }
}

fn rescan_overflowed(orchestrator: &Arc<ScanOrchestrator>, watcher: &ChangeWatcher) {
    for folder_id in watcher.take_overflowed() {
        spawn_rescan(orchestrator, folder_id, "event queue overflowed");
    }
}

async fn resubscribe_lost(
    orchestrator: &Arc<ScanOrchestrator>,
    watcher: &ChangeWatcher,
    config: &WatcherConfig,
    backoff: &mut HashMap<FolderId, Backoff>,
) {
    let lost = watcher.lost_folders();
    backoff.retain(|id, _| lost.contains(id));

    let now = Instant::now();
    for folder_id in lost {
        let schedule = backoff.entry(folder_id).or_insert_with(|| Backoff {
            next_attempt: now,
            delay: config.initial_backoff,
        });
        if schedule.next_attempt > now {
            continue;
        }

        match watcher.resubscribe(folder_id).await {
            Ok(()) => {
                backoff.remove(&folder_id);
                spawn_rescan(orchestrator, folder_id, "subscription restored");
            }
            Err(e) => {
                schedule.delay = (schedule.delay * 2).min(config.max_backoff);
                schedule.next_attempt = now + schedule.delay;
                warn!(
                    folder_id,
                    error = %e,
                    retry_in = ?schedule.delay,
                    "Re-subscription failed"
                );
            }
        }
    }
}

fn spawn_rescan(orchestrator: &Arc<ScanOrchestrator>, folder_id: FolderId, reason: &'static str) {
    info!(folder_id, reason, "Rescanning folder");
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        if let Err(e) = orchestrator.scan(folder_id).await {
            error!(folder_id, error = %e, "Rescan failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        Event {
            kind,
            paths: paths.iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_watcher_config_from_scanner_config() {
        let config = WatcherConfig::from(&ScannerConfig {
            debounce_ms: 100,
            watch_queue_capacity: 0,
            ..Default::default()
        });
        assert_eq!(config.debounce_duration, Duration::from_millis(100));
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(WatcherConfig::default().debounce_duration, Duration::from_millis(500));
    }

    #[test]
    fn test_convert_create_event() {
        let result = convert_event(&event(EventKind::Create(CreateKind::File), &["/m/a.mkv"]));
        assert_eq!(result, Some(WatcherEvent::Created(PathBuf::from("/m/a.mkv"))));
    }

    #[test]
    fn test_convert_modify_event() {
        let result = convert_event(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            &["/m/a.mkv"],
        ));
        assert!(matches!(result, Some(WatcherEvent::Modified(_))));
    }

    #[test]
    fn test_convert_remove_event() {
        let result = convert_event(&event(EventKind::Remove(RemoveKind::File), &["/m/a.mkv"]));
        assert!(matches!(result, Some(WatcherEvent::Removed(_))));
    }

    #[test]
    fn test_convert_rename_events() {
        let both = convert_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/m/old.mkv", "/m/new.mkv"],
        ));
        assert_eq!(
            both,
            Some(WatcherEvent::Renamed(PathBuf::from("/m/old.mkv"), PathBuf::from("/m/new.mkv")))
        );

        let from = convert_event(&event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/m/old.mkv"]));
        assert!(matches!(from, Some(WatcherEvent::Removed(_))));

        let to = convert_event(&event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/m/new.mkv"]));
        assert!(matches!(to, Some(WatcherEvent::Created(_))));
    }

    #[test]
    fn test_access_events_are_ignored() {
        let access = event(EventKind::Access(notify::event::AccessKind::Any), &["/m/a.mkv"]);
        assert_eq!(convert_event(&access), None);
    }

    #[test]
    fn rename_reconciles_old_path_before_new() {
        let renamed = WatcherEvent::Renamed(PathBuf::from("/m/a.mkv"), PathBuf::from("/m/b.mkv"));
        assert_eq!(renamed.paths(), vec![Path::new("/m/a.mkv"), Path::new("/m/b.mkv")]);
    }

    #[test]
    fn root_removal_is_detected() {
        let root = Path::new("/m");
        assert!(is_root_removal(&event(EventKind::Remove(RemoveKind::Folder), &["/m"]), root));
        assert!(!is_root_removal(&event(EventKind::Remove(RemoveKind::File), &["/m/a.mkv"]), root));
    }

    #[test]
    fn full_queue_drops_the_event_and_flags_a_rescan() {
        let mut watcher = ChangeWatcher::new(WatcherConfig {
            queue_capacity: 1,
            ..WatcherConfig::default()
        });
        let mut event_rx = watcher.take_event_receiver().unwrap();

        enqueue(&watcher.event_tx, &watcher.overflowed, 7, WatcherEvent::Created(PathBuf::from("/m/a.mkv")));
        enqueue(&watcher.event_tx, &watcher.overflowed, 7, WatcherEvent::Created(PathBuf::from("/m/b.mkv")));

        assert_eq!(
            event_rx.try_recv().unwrap(),
            (7, WatcherEvent::Created(PathBuf::from("/m/a.mkv")))
        );
        assert!(event_rx.try_recv().is_err());
        assert_eq!(watcher.take_overflowed(), vec![7]);
    }

    #[tokio::test]
    async fn missing_root_marks_the_watch_lost() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("movies");
        std::fs::create_dir(&root).unwrap();
        let folder = LibraryFolder {
            id: 5,
            name: "Movies".to_string(),
            path: root.to_string_lossy().into_owned(),
            media_kind: ayiah_core::types::MediaKind::Movie,
            enabled: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let watcher = ChangeWatcher::new(WatcherConfig::default());
        assert!(watcher.watch_folder(&folder).await.unwrap());

        watcher.detect_missing_roots().await;
        assert!(watcher.lost_folders().is_empty());

        std::fs::remove_dir_all(&root).unwrap();
        watcher.detect_missing_roots().await;
        assert_eq!(watcher.lost_folders(), vec![5]);
        assert!(watcher.is_watching(5).await);
        assert!(watcher.resubscribe(5).await.is_err());

        std::fs::create_dir(&root).unwrap();
        watcher.resubscribe(5).await.unwrap();
        assert!(watcher.lost_folders().is_empty());
    }

    #[test]
    fn draining_overflow_flags_resets_them() {
        let watcher = ChangeWatcher::new(WatcherConfig::default());
        watcher.overflowed.insert(3);
        watcher.overflowed.insert(3);
        assert_eq!(watcher.take_overflowed(), vec![3]);
        assert!(watcher.take_overflowed().is_empty());
    }
}
