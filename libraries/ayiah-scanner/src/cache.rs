//! Metadata cache keyed by content fingerprint and extraction target
//!
//! Each key owns a slot holding a `OnceCell`. The first caller runs the
//! extraction; concurrent callers for the same key wait on that cell instead
//! of extracting again. Slots live in a `DashMap`, so callers with unrelated
//! keys never contend on a shared lock.
//!
//! Definitive outcomes (including `Failed`) are cached. A transient error
//! leaves the cell empty, so the next caller retries the extraction.

use crate::fingerprint::Fingerprint;
use ayiah_metadata::{Classified, ExtractionOutcome, MetadataError};
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// What an extraction outcome is cached under
///
/// Byte-identical files share an entry only when they are extracted for the
/// same kind and format: a PDF yields a comic record in a comic folder and a
/// book record in a book folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub target: Classified,
}

impl CacheKey {
    pub fn new(fingerprint: Fingerprint, target: Classified) -> Self {
        Self { fingerprint, target }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.target.kind, self.target.format.name(), self.fingerprint)
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held (including in-flight extractions)
    pub entries: usize,
    /// Lookups answered without running the extractor
    pub hits: u64,
    /// Extractor invocations
    pub extractions: u64,
    /// Entries dropped by the recency policy
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Slot {
    cell: OnceCell<ExtractionOutcome>,
    last_used: AtomicU64,
}

/// Bounded, recency-evicting cache of extraction outcomes
#[derive(Debug)]
pub struct MetadataCache {
    capacity: usize,
    slots: DashMap<CacheKey, Arc<Slot>>,
    clock: AtomicU64,
    hits: AtomicU64,
    extractions: AtomicU64,
    evictions: AtomicU64,
}

impl MetadataCache {
    /// Create a cache holding at most `capacity` outcomes (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: DashMap::new(),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            extractions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.slots.len(),
            hits: self.hits.load(Ordering::Relaxed),
            extractions: self.extractions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Return the cached outcome for `key`, or run `extract` once
    ///
    /// Concurrent calls with the same key share one `extract` run.
    pub async fn get_or_extract<F, Fut>(
        &self,
        key: &CacheKey,
        extract: F,
    ) -> Result<ExtractionOutcome, MetadataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ExtractionOutcome, MetadataError>>,
    {
        // Clone the slot out so no map guard is held across an await
        let slot = Arc::clone(
            self.slots
                .entry(key.clone())
                .or_default()
                .value(),
        );
        slot.last_used.store(self.tick(), Ordering::Relaxed);

        let mut ran = false;
        let result = slot
            .cell
            .get_or_try_init(|| {
                ran = true;
                self.extractions.fetch_add(1, Ordering::Relaxed);
                extract()
            })
            .await
            .cloned();

        match &result {
            Ok(_) if !ran => {
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => self.evict_over_capacity(),
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "Transient extraction error, not cached");
                self.slots.remove_if(key, |_, current| {
                    Arc::ptr_eq(current, &slot) && !current.cell.initialized()
                });
            }
        }

        result
    }

    /// Forget one entry so the next lookup extracts again
    ///
    /// A caller already waiting on the old slot keeps its result.
    pub fn invalidate(&self, key: &CacheKey) {
        self.slots.remove(key);
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Drop least-recently-used completed entries until within capacity
    ///
    /// In-flight slots are never evicted: waiters are parked on them.
    fn evict_over_capacity(&self) {
        while self.slots.len() > self.capacity {
            let oldest = self
                .slots
                .iter()
                .filter(|entry| entry.value().cell.initialized())
                .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());

            let Some(key) = oldest else { break };
            if self.slots.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(crate::config::ScannerConfig::default().cache_capacity)
    }
}
