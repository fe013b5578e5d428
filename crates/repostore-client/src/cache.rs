//! TTL cache for file reads.
//!
//! Entries are keyed by repository path and honored only while unexpired.
//! Expiry is checked lazily on access; nothing sweeps the map, and an expired
//! entry stays in place until `set` overwrites it or the cache is cleared.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use repostore_models::FileContent;

use crate::metrics::record_cache_lookup;

/// Default lifetime of a cached read (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    value: FileContent,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Async-aware file cache.
pub struct FileCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl FileCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached value for `path`, if present and unexpired.
    pub async fn get(&self, path: &str) -> Option<FileContent> {
        let entries = self.entries.read().await;
        let hit = entries
            .get(path)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.value.clone());

        record_cache_lookup(hit.is_some());
        if hit.is_some() {
            debug!(path, "Cache hit");
        }
        hit
    }

    /// Store a value; `ttl` defaults to the cache's configured lifetime.
    pub async fn set(&self, path: &str, value: FileContent, ttl: Option<Duration>) {
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        let mut entries = self.entries.write().await;
        entries.insert(path.to_string(), CacheEntry { value, expires_at });
    }

    pub async fn invalidate(&self, path: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(path).is_some() {
            debug!(path, "Cache entry invalidated");
        }
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// =============================================================================
// Tests
// =============================================================================
