//! Get-or-set cache for arbitrary computations

use crate::engine::{CacheEngine, PopulateResult};
use crate::error::{CacheError, Result};
use bytes::Bytes;
use rowcache_types::CacheKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Caches the result of caller-supplied computations under opaque keys.
#[derive(Clone)]
pub struct ComputeCache {
    engine: Arc<CacheEngine>,
}

impl ComputeCache {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }

    /// Return the cached value for `key`, or run `compute`, cache its result
    /// for `ttl` and return it.
    ///
    /// Concurrent callers for the same key share one computation. A failed
    /// computation caches nothing and its error reaches every caller waiting
    /// on it as [`CacheError::Compute`].
    ///
    /// Every caller, including the one that ran `compute`, gets the value
    /// decoded from the stored payload. `T` therefore has to survive the
    /// codec; decode into `serde_json::Value` to get generic containers.
    pub async fn get_or_set<T, E, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        E: std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let cache_key = self.key(key)?;
        let codec = self.engine.codec();

        let payload = self
            .engine
            .read_through(&cache_key, ttl, || async move {
                let value = compute()
                    .await
                    .map_err(|e| CacheError::Compute(e.to_string()))?;
                Ok(PopulateResult::Found(Bytes::from(codec.encode_checked(&value)?)))
            })
            .await?;

        match payload {
            Some(bytes) => codec.decode(&bytes),
            None => Err(CacheError::Serialization(format!(
                "no payload stored for {}",
                cache_key
            ))),
        }
    }

    /// Drop a computed entry so the next `get_or_set` recomputes it.
    pub async fn forget(&self, key: &str) -> Result<bool> {
        let cache_key = self.key(key)?;
        Ok(self.engine.invalidate(&[cache_key]).await? > 0)
    }

    fn key(&self, key: &str) -> Result<CacheKey> {
        Ok(CacheKey::compute(self.engine.namespace(), key)?)
    }
}
