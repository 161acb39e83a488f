//! Generic read-through engine
//!
//! Both the resource cache and the compute cache are thin façades over
//! [`CacheEngine::read_through`]: they supply a key, a TTL and a populate
//! future that produces an encoded payload, and decode whatever payload the
//! engine hands back.

use crate::coalescer::Coalescer;
use crate::codec::Codec;
use crate::config::{AbsentPolicy, CacheConfig};
use crate::error::Result;
use crate::ports::KeyValueStore;
use crate::stats::{CacheCounters, CacheStats};
use bytes::Bytes;
use rowcache_types::CacheKey;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Outcome of producing fresh data for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateResult {
    /// Encoded payload to write through.
    Found(Bytes),
    /// The authoritative store has nothing for this key.
    Absent,
}

pub struct CacheEngine {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
    coalescer: Coalescer<Option<Bytes>>,
    counters: CacheCounters,
}

impl CacheEngine {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            coalescer: Coalescer::new(),
            counters: CacheCounters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn codec(&self) -> Codec {
        self.config.codec
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        self.counters
            .snapshot(self.coalescer.followers(), self.coalescer.in_flight())
    }

    /// Return the cached payload for `key`, populating it on a miss.
    ///
    /// Concurrent calls for the same key share one store lookup and at most
    /// one `populate`. `Ok(None)` means the record is absent. A transport
    /// error from the key/value store is returned as is; it never falls
    /// through to `populate`.
    pub async fn read_through<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        populate: F,
    ) -> Result<Option<Bytes>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PopulateResult>>,
    {
        self.coalescer
            .run(key.as_str(), || async move {
                match self.store.get(key.as_str()).await {
                    Ok(Some(payload)) => {
                        self.counters.hit();
                        debug!("Cache hit: {}", key);
                        if payload.is_empty() {
                            // Tombstone left by AbsentPolicy::Cache.
                            return Ok(None);
                        }
                        Ok(Some(payload))
                    }
                    Ok(None) => {
                        self.counters.miss();
                        debug!("Cache miss: {}", key);
                        self.write_through(key, ttl, populate).await
                    }
                    Err(e) => {
                        self.counters.error();
                        warn!("Cache read failed for {}: {}", key, e);
                        Err(e)
                    }
                }
            })
            .await
    }

    /// Run `populate` and write its payload to the key/value store,
    /// bypassing the coalescer. Returns the payload, or `None` if absent.
    pub async fn write_through<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        populate: F,
    ) -> Result<Option<Bytes>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PopulateResult>>,
    {
        let populated = match populate().await {
            Ok(populated) => populated,
            Err(e) => {
                self.counters.error();
                warn!("Populate failed for {}: {}", key, e);
                return Err(e);
            }
        };

        match populated {
            PopulateResult::Found(payload) => {
                self.put(key, payload.clone(), ttl).await?;
                self.counters.populated();
                debug!("Populated {} ({} bytes, ttl {:?})", key, payload.len(), ttl);
                Ok(Some(payload))
            }
            PopulateResult::Absent => {
                self.counters.absent();
                match self.config.absent_policy {
                    AbsentPolicy::Skip => debug!("Absent: {} (not cached)", key),
                    AbsentPolicy::Cache { ttl } => {
                        self.put(key, Bytes::new(), ttl).await?;
                        debug!("Absent: {} (tombstone, ttl {:?})", key, ttl);
                    }
                }
                Ok(None)
            }
        }
    }

    /// Remove entries. An empty list performs no I/O.
    pub async fn invalidate(&self, keys: &[CacheKey]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
        match self.store.del(&keys).await {
            Ok(removed) => {
                debug!("Invalidated {} of {} keys", removed, keys.len());
                Ok(removed)
            }
            Err(e) => {
                self.counters.error();
                error!("Failed to delete {:?}: {}", keys, e);
                Err(e)
            }
        }
    }

    pub async fn contains(&self, key: &CacheKey) -> Result<bool> {
        self.store.exists(key.as_str()).await
    }

    async fn put(&self, key: &CacheKey, payload: Bytes, ttl: Duration) -> Result<()> {
        if let Err(e) = self.store.set(key.as_str(), payload, ttl).await {
            self.counters.error();
            warn!("Cache write failed for {}: {}", key, e);
            return Err(e);
        }
        Ok(())
    }
}
