//! LRU store for read results.
//!
//! Holds the last fetched value per [`QueryKey`] and a write epoch per
//! [`ScopeFamily`]. Invalidating a family bumps its epoch; a fetch that began
//! under an older epoch is not written back, so it cannot resurrect data the
//! invalidation just dropped.

use super::scope::{QueryKey, ScopeFamily, ScopePattern};
use crate::backend::{ArtistProfile, MediaCard, MediaItem, SessionStatus};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default cache capacity.
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// A cached read result.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedRead {
    /// A list of media items.
    MediaList(Vec<MediaItem>),
    /// One media item with context, or its absence.
    MediaCard(Option<Box<MediaCard>>),
    /// Every media item with context.
    MediaCards(Vec<MediaCard>),
    /// An artist profile, or its absence.
    Artist(Option<ArtistProfile>),
    /// A boolean flag.
    Flag(bool),
    /// A checkout session status.
    SessionStatus(SessionStatus),
}

/// Values that can live in the cache.
pub trait Cacheable: Sized {
    /// Wrap for storage.
    fn into_cached(self) -> CachedRead;

    /// Unwrap a stored value, `None` if it holds another type.
    fn from_cached(read: &CachedRead) -> Option<Self>;

    /// Whether the value can no longer change without a mutation. Unsettled
    /// values are returned but not cached.
    fn is_settled(&self) -> bool {
        true
    }
}

impl Cacheable for Vec<MediaItem> {
    fn into_cached(self) -> CachedRead {
        CachedRead::MediaList(self)
    }

    fn from_cached(read: &CachedRead) -> Option<Self> {
        match read {
            CachedRead::MediaList(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl Cacheable for Option<MediaCard> {
    fn into_cached(self) -> CachedRead {
        CachedRead::MediaCard(self.map(Box::new))
    }

    fn from_cached(read: &CachedRead) -> Option<Self> {
        match read {
            CachedRead::MediaCard(card) => Some(card.as_deref().cloned()),
            _ => None,
        }
    }
}

impl Cacheable for Vec<MediaCard> {
    fn into_cached(self) -> CachedRead {
        CachedRead::MediaCards(self)
    }

    fn from_cached(read: &CachedRead) -> Option<Self> {
        match read {
            CachedRead::MediaCards(cards) => Some(cards.clone()),
            _ => None,
        }
    }
}

impl Cacheable for Option<ArtistProfile> {
    fn into_cached(self) -> CachedRead {
        CachedRead::Artist(self)
    }

    fn from_cached(read: &CachedRead) -> Option<Self> {
        match read {
            CachedRead::Artist(profile) => Some(profile.clone()),
            _ => None,
        }
    }
}

impl Cacheable for bool {
    fn into_cached(self) -> CachedRead {
        CachedRead::Flag(self)
    }

    fn from_cached(read: &CachedRead) -> Option<Self> {
        match read {
            CachedRead::Flag(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl Cacheable for SessionStatus {
    fn into_cached(self) -> CachedRead {
        CachedRead::SessionStatus(self)
    }

    fn from_cached(read: &CachedRead) -> Option<Self> {
        match read {
            CachedRead::SessionStatus(status) => Some(status.clone()),
            _ => None,
        }
    }

    // An unpaid session can still complete at the gateway.
    fn is_settled(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries written.
    pub additions: u64,
    /// Number of entries removed by invalidation.
    pub invalidated: u64,
    /// Writes dropped because an invalidation overtook the fetch.
    pub stale_writes: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct Inner {
    entries: LruCache<QueryKey, CachedRead>,
    epochs: HashMap<ScopeFamily, u64>,
}

impl Inner {
    fn epoch(&self, family: ScopeFamily) -> u64 {
        self.epochs.get(&family).copied().unwrap_or(0)
    }
}

/// Scope-keyed LRU store shared by every component of a client.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Mutex<Inner>>,
    stats: Arc<Mutex<CacheStats>>,
}

impl QueryCache {
    /// Create a new cache with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a new cache with the specified capacity (at least one entry).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: LruCache::new(cap),
                epochs: HashMap::new(),
            })),
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    /// Look up a key, recording a hit or miss.
    pub fn get(&self, key: &QueryKey) -> Option<CachedRead> {
        let found = self.inner.lock().entries.get(key).cloned();

        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    /// Look up a key without touching statistics or recency.
    #[must_use]
    pub fn peek(&self, key: &QueryKey) -> Option<CachedRead> {
        self.inner.lock().entries.peek(key).cloned()
    }

    /// Current write epoch of a family.
    #[must_use]
    pub fn epoch(&self, family: ScopeFamily) -> u64 {
        self.inner.lock().epoch(family)
    }

    /// Store `value` unless `key`'s family was invalidated after `epoch`.
    ///
    /// Returns whether the value was written.
    pub fn insert_if_current(&self, key: QueryKey, value: CachedRead, epoch: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch(key.family()) != epoch {
            drop(inner);
            self.stats.lock().stale_writes += 1;
            return false;
        }
        inner.entries.put(key, value);
        drop(inner);

        self.stats.lock().additions += 1;
        true
    }

    /// Drop every entry matching `patterns` and bump their families' epochs.
    ///
    /// Returns the keys that were removed.
    pub fn invalidate(&self, patterns: &[ScopePattern]) -> Vec<QueryKey> {
        let mut inner = self.inner.lock();
        for pattern in patterns {
            *inner.epochs.entry(pattern.family()).or_insert(0) += 1;
        }

        let doomed: Vec<QueryKey> = inner
            .entries
            .iter()
            .map(|(key, _)| key)
            .filter(|key| patterns.iter().any(|p| p.matches(key)))
            .cloned()
            .collect();
        for key in &doomed {
            inner.entries.pop(key);
        }
        drop(inner);

        self.stats.lock().invalidated += doomed.len() as u64;
        doomed
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Get the current number of entries in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}
