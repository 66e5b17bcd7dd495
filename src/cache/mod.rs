//! Cache consistency for read results.
//!
//! Every read goes through [`CacheConsistencyManager::read_through`]. Every
//! successful mutation is followed by [`CacheConsistencyManager::invalidate`],
//! which drops the scopes the mutation declares and tells observers to
//! re-fetch.
//!
//! # Architecture
//!
//! ```text
//! read(key)                              mutation succeeded
//!    │                                          │
//!    ▼                                          ▼
//! ┌──────────────┐                   ┌─────────────────────┐
//! │ LRU lookup   │                   │ affected_scopes()   │
//! └──────┬───────┘                   └──────────┬──────────┘
//!        │                                      │
//!  ┌─────┴─────┐                     drop matching keys,
//!  │           │                     bump family epochs
//! HIT        MISS                               │
//!  │           │                                ▼
//!  ▼           ▼                     CacheInvalidated event
//! value    fetch ──► write back only if
//!                    the family epoch is unchanged
//! ```

mod scope;
mod store;

pub use scope::{Mutation, QueryKey, ScopeFamily, ScopePattern};
pub use store::{CacheStats, Cacheable, CachedRead, QueryCache};

use crate::error::Result;
use crate::event::{ClientEvent, ClientEventsSender};
use std::future::Future;
use tracing::{debug, warn};

/// Keeps cached reads consistent with the backend.
#[derive(Clone, Default)]
pub struct CacheConsistencyManager {
    store: QueryCache,
    events: Option<ClientEventsSender>,
}

impl CacheConsistencyManager {
    /// Manage `store`.
    #[must_use]
    pub fn new(store: QueryCache) -> Self {
        Self {
            store,
            events: None,
        }
    }

    /// Publish `CacheInvalidated` events on `events`.
    #[must_use]
    pub fn with_events(mut self, events: ClientEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &QueryCache {
        &self.store
    }

    /// Cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Return the cached value for `key`, or fetch and cache it.
    ///
    /// Fetch errors are returned and nothing is cached. A fetched value is
    /// not cached if it is unsettled (see [`Cacheable::is_settled`]) or if an
    /// invalidation of its family landed while it was in flight; it is still
    /// returned to this caller.
    ///
    /// # Errors
    ///
    /// Returns whatever `fetch` returns.
    pub async fn read_through<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T>
    where
        T: Cacheable + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.store.get(&key).as_ref().and_then(T::from_cached) {
            debug!("Cache hit for {key}");
            return Ok(value);
        }

        let epoch = self.store.epoch(key.family());
        let value = fetch().await?;
        if value.is_settled() {
            if !self
                .store
                .insert_if_current(key.clone(), value.clone().into_cached(), epoch)
            {
                debug!("Discarded stale read of {key}");
            }
        } else {
            debug!("Not caching unsettled read of {key}");
        }
        Ok(value)
    }

    /// Drop every cached read `mutation` makes stale.
    ///
    /// Returns the keys that were removed. Never fails: a missing event
    /// subscriber is only logged.
    pub fn invalidate(&self, mutation: &Mutation) -> Vec<QueryKey> {
        let scopes = mutation.affected_scopes();
        if scopes.is_empty() {
            return Vec::new();
        }
        self.invalidate_scopes(&scopes)
    }

    /// Drop every cached read matching `scopes`.
    pub fn invalidate_scopes(&self, scopes: &[ScopePattern]) -> Vec<QueryKey> {
        let removed = self.store.invalidate(scopes);
        debug!(
            "Invalidated {} scopes, {} cached reads removed",
            scopes.len(),
            removed.len()
        );

        if let Some(ref events) = self.events {
            if events
                .send(ClientEvent::CacheInvalidated {
                    keys: removed.clone(),
                })
                .is_err()
            {
                warn!("No subscribers for cache invalidation event");
            }
        }
        removed
    }
}
