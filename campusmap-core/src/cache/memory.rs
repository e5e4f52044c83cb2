//! In-process cache backends.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use lru::LruCache;

use super::{CacheError, Fingerprint, QueryCache};
use crate::engine::{Generation, QueryOutput};

/// A cached result bound to the generation that produced it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Generation whose snapshot produced `payload`.
    pub generation: Generation,
    /// The cached result.
    pub payload: Arc<QueryOutput>,
    /// When the entry was stored.
    pub inserted_at: Instant,
}

/// Capacity-bounded LRU cache with optional expiry.
///
/// Entries from a superseded generation are evicted the first time they are
/// looked up, so a reload never has to walk the cache.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<LruCache<Fingerprint, CacheEntry>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize, ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |entries| entries.len())
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<Fingerprint, CacheEntry>>, CacheError> {
        self.entries.lock().map_err(|_| CacheError::Unavailable {
            message: "memory cache lock poisoned".to_owned(),
        })
    }

    fn is_fresh(&self, entry: &CacheEntry, generation: Generation) -> bool {
        entry.generation == generation
            && self
                .ttl
                .is_none_or(|ttl| entry.inserted_at.elapsed() <= ttl)
    }
}

impl QueryCache for MemoryCache {
    fn get(
        &self,
        fingerprint: &Fingerprint,
        generation: Generation,
    ) -> Result<Option<Arc<QueryOutput>>, CacheError> {
        let mut entries = self.lock()?;
        let Some(entry) = entries.get(fingerprint) else {
            return Ok(None);
        };
        if self.is_fresh(entry, generation) {
            return Ok(Some(Arc::clone(&entry.payload)));
        }
        entries.pop(fingerprint);
        Ok(None)
    }

    fn put(
        &self,
        fingerprint: Fingerprint,
        generation: Generation,
        payload: Arc<QueryOutput>,
    ) -> Result<(), CacheError> {
        self.lock()?.put(
            fingerprint,
            CacheEntry {
                generation,
                payload,
                inserted_at: Instant::now(),
            },
        );
        Ok(())
    }

    fn clear(&self) -> Result<usize, CacheError> {
        let mut entries = self.lock()?;
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl QueryCache for NoopCache {
    fn get(
        &self,
        _fingerprint: &Fingerprint,
        _generation: Generation,
    ) -> Result<Option<Arc<QueryOutput>>, CacheError> {
        Ok(None)
    }

    fn put(
        &self,
        _fingerprint: Fingerprint,
        _generation: Generation,
        _payload: Arc<QueryOutput>,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}
