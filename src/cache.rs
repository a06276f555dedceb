//! In-memory key/value cache with per-entry expiry.
//!
//! Keys follow a namespace convention (`branches_*`, `remote_*`, `status`)
//! so that a mutation can drop every related entry with a single
//! substring invalidation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local cache with TTL entries.
///
/// Expired entries are treated as absent by [`get`](Self::get) and
/// [`has`](Self::has) whether or not the background sweep has reclaimed them.
///
/// Every invalidation bumps a generation counter. A reader that started
/// before an invalidation can use [`set_if_generation`](Self::set_if_generation)
/// so its older result does not land back in the cache.
pub struct CacheStore<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    generation: AtomicU64,
}

impl<V> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CacheStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // A poisoned map only means a panic happened mid-insert; the data is still usable.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Store a value. A zero TTL means "do not cache" and removes any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut entries = self.lock();
        Self::insert(&mut entries, key.into(), value, ttl);
    }

    /// Store a value only if no invalidation happened since `generation` was read.
    ///
    /// Returns whether the value was stored.
    pub fn set_if_generation(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Duration,
        generation: u64,
    ) -> bool {
        let mut entries = self.lock();
        if self.generation() != generation {
            return false;
        }
        Self::insert(&mut entries, key.into(), value, ttl);
        true
    }

    fn insert(entries: &mut HashMap<String, CacheEntry<V>>, key: String, value: V, ttl: Duration) {
        if ttl.is_zero() {
            entries.remove(&key);
            return;
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Whether a live entry exists. Purges the entry if it has expired.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => true,
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    /// Remove every key containing `pattern`, or everything when `pattern` is `None`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        let mut entries = self.lock();
        // Bumped under the map lock so set_if_generation sees it atomically.
        self.generation.fetch_add(1, Ordering::SeqCst);
        let before = entries.len();
        match pattern {
            Some(pattern) => entries.retain(|key, _| !key.contains(pattern)),
            None => entries.clear(),
        }
        let removed = before - entries.len();
        if removed > 0 {
            debug!(?pattern, removed, "Cache invalidated");
        }
        removed
    }

    /// Drop all expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl<V: Clone> CacheStore<V> {
    /// Fetch a live value. Expired entries are purged and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl<V: Send + 'static> CacheStore<V> {
    /// Spawn a task that reclaims expired entries every `interval`.
    ///
    /// The caller owns the returned handle and aborts it on shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, "Swept expired cache entries");
                }
            }
        })
    }
}
