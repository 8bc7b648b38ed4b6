//! Scanner configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default minimum file size (1 KiB)
pub const DEFAULT_MIN_FILE_SIZE: u64 = 1024;

/// Default number of leading bytes hashed into a content fingerprint (64 KiB)
pub const DEFAULT_FINGERPRINT_PREFIX: usize = 64 * 1024;

/// Default debounce window in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Tunables for walking, extraction and watching
///
/// Every field has a default, so a partial `[scanner]` table deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Files smaller than this are never cataloged
    pub min_file_size: u64,

    /// Directory or file names skipped during walks and watches
    pub ignore: Vec<String>,

    /// Leading bytes hashed (together with the size) into a fingerprint
    pub fingerprint_prefix_bytes: usize,

    /// Leading bytes handed to the content classifier
    pub sniff_prefix_bytes: usize,

    /// Size of the worker pool shared by every folder scan
    pub workers: usize,

    /// Maximum number of extraction results kept in the metadata cache
    pub cache_capacity: usize,

    /// Per-path coalescing window for filesystem events
    pub debounce_ms: u64,

    /// Capacity of the queue between the watcher and the reconciler
    pub watch_queue_capacity: usize,

    /// First delay before re-subscribing a lost watch
    pub resubscribe_backoff_ms: u64,

    /// Upper bound for the re-subscription delay
    pub resubscribe_backoff_max_ms: u64,

    /// Re-extract metadata even for unchanged files
    pub force_refresh: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            ignore: ["@eaDir", "#recycle", "lost+found", "$RECYCLE.BIN"]
                .into_iter()
                .map(String::from)
                .collect(),
            fingerprint_prefix_bytes: DEFAULT_FINGERPRINT_PREFIX,
            sniff_prefix_bytes: ayiah_metadata::MIN_SNIFF_LEN,
            workers: num_cpus::get(),
            cache_capacity: 4096,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            watch_queue_capacity: 1024,
            resubscribe_backoff_ms: 500,
            resubscribe_backoff_max_ms: 30_000,
            force_refresh: false,
        }
    }
}

impl ScannerConfig {
    /// Worker count, never below one
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }

    /// Bytes to read up front: enough for both sniffing and fingerprinting
    pub fn prefix_len(&self) -> usize {
        self.fingerprint_prefix_bytes
            .max(self.sniff_prefix_bytes)
            .max(1)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.resubscribe_backoff_ms.max(1))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.resubscribe_backoff_max_ms.max(self.resubscribe_backoff_ms))
    }

    /// Whether `name` is on the ignore list
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|ignored| ignored == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_config_default() {
        let config = ScannerConfig::default();
        assert_eq!(config.min_file_size, 1024);
        assert_eq!(config.fingerprint_prefix_bytes, 64 * 1024);
        assert_eq!(config.sniff_prefix_bytes, 512);
        assert_eq!(config.cache_capacity, 4096);
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert!(config.worker_count() >= 1);
        assert!(config.is_ignored("@eaDir"));
        assert!(!config.force_refresh);
    }

    #[test]
    fn partial_table_fills_defaults() {
        let config: ScannerConfig =
            serde_json::from_str(r#"{ "workers": 2, "force_refresh": true }"#).unwrap();
        assert_eq!(config.workers, 2);
        assert!(config.force_refresh);
        assert_eq!(config.watch_queue_capacity, 1024);
        assert_eq!(config.prefix_len(), 64 * 1024);
    }

    #[test]
    fn backoff_bounds_are_ordered() {
        let config = ScannerConfig {
            resubscribe_backoff_ms: 5_000,
            resubscribe_backoff_max_ms: 10,
            ..Default::default()
        };
        assert!(config.max_backoff() >= config.initial_backoff());
        assert_eq!(ScannerConfig { workers: 0, ..Default::default() }.worker_count(), 1);
    }
}
