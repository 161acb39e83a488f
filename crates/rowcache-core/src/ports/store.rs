//! Key/value store port

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Fast store holding encoded cache entries.
///
/// A missing key is `Ok(None)`, never an error; `Err` is reserved for
/// transport failures. Writes must be atomic per key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value` under `key`, fully replacing any previous entry.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Remove keys, returning how many existed. Missing keys are not an error.
    async fn del(&self, keys: &[String]) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;
}
