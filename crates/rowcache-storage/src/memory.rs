//! In-memory key/value store using DashMap

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use rowcache_core::{KeyValueStore, Result};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Process-local key/value store with per-entry TTL.
///
/// Expired entries are hidden on read and swept periodically by a background
/// task, which stops once the last handle is dropped.
pub struct MemoryCache {
    data: Arc<DashMap<String, CacheEntry>>,
}

struct CacheEntry {
    value: Bytes,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        let cache = Self {
            data: Arc::new(DashMap::new()),
        };

        // Start cleanup task
        cache.start_cleanup_task();

        cache
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn live(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        let entry = self.data.get(key)?;
        if entry.is_expired(now) {
            drop(entry);
            self.data.remove_if(key, |_, entry| entry.is_expired(now));
            return None;
        }
        Some(entry.value.clone())
    }

    fn start_cleanup_task(&self) {
        // Outside a runtime the store still works; expired entries are then
        // only dropped on access.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let data: Weak<DashMap<String, CacheEntry>> = Arc::downgrade(&self.data);
        handle.spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(data) = data.upgrade() else {
                    break;
                };
                let now = Instant::now();
                let before = data.len();
                data.retain(|_, entry| !entry.is_expired(now));
                let swept = before.saturating_sub(data.len());
                if swept > 0 {
                    tracing::debug!("Swept {} expired cache entries", swept);
                }
            }
        });
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.live(key))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.data.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|key| self.data.remove(key))
            .filter(|(_, entry)| !entry.is_expired(now))
            .count();
        Ok(removed as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live(key).is_some())
    }
}
