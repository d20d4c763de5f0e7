//! Read-through cache for loaded scenes.
//!
//! Loading and classifying a raster is the expensive step, so both the
//! `render` command and the server go through an explicit cache object they
//! own. Entries are keyed by file identity (path, modification time, length)
//! or by a hash of the raw bytes for uploads. The cache is bounded and
//! evicts the least recently used entry.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::Result;
use crate::state::Scene;

/// Identity of a raster source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A file on disk; a rewrite changes the modification time or length
    File {
        path: PathBuf,
        modified: Option<SystemTime>,
        len: u64,
    },
    /// In-memory bytes, identified by their xxh3 hash
    Content(u64),
}

impl CacheKey {
    pub fn for_file(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(CacheKey::File {
            path: path.to_path_buf(),
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }

    pub fn for_bytes(bytes: &[u8]) -> Self {
        CacheKey::Content(xxh3_64(bytes))
    }
}

/// Counters reported by the heartbeat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Inner<V> {
    entries: LruCache<CacheKey, Arc<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// A bounded map from [`CacheKey`] to shared values, filled on demand.
pub struct ReadThroughCache<V> {
    inner: Mutex<Inner<V>>,
}

/// The cache used for rasters and their derived products.
pub type SceneCache = ReadThroughCache<Scene>;

impl<V> ReadThroughCache<V> {
    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Look up a key without touching the counters.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Return the cached value for `key`, calling `load` on a miss.
    ///
    /// The lock is not held while `load` runs, so two concurrent misses on
    /// the same key may both load; the later insert wins.
    pub fn get_or_load<F>(&self, key: CacheKey, load: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        {
            let mut inner = self.inner.lock();
            if let Some(value) = inner.entries.get(&key).cloned() {
                inner.hits += 1;
                debug!(key = ?key, "Cache hit");
                return Ok(value);
            }
            inner.misses += 1;
        }

        debug!(key = ?key, "Cache miss");
        let value = Arc::new(load()?);
        self.insert(key, Arc::clone(&value));
        Ok(value)
    }

    pub fn insert(&self, key: CacheKey, value: Arc<V>) {
        let mut inner = self.inner.lock();
        if let Some((evicted, _)) = inner.entries.push(key.clone(), value) {
            // push also hands back the old value when the key was present
            if evicted != key {
                debug!(key = ?evicted, "Evicting cache entry");
                inner.evictions += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            capacity: inner.entries.cap().get(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}
