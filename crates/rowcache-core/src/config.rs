//! Cache configuration

use crate::codec::Codec;
use std::time::Duration;

/// Namespace prefixed to every key unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "cache";

/// TTL applied to resource rows unless configured otherwise.
pub const DEFAULT_RESOURCE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// What to do when the backing store has no row for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsentPolicy {
    /// Store nothing; every lookup of a missing row queries the backing store.
    #[default]
    Skip,
    /// Store a tombstone for `ttl`, answering repeated lookups from the cache.
    Cache { ttl: Duration },
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// First segment of every key.
    pub namespace: String,
    /// TTL for resource rows written through on a miss.
    pub resource_ttl: Duration,
    pub absent_policy: AbsentPolicy,
    pub codec: Codec,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            resource_ttl: DEFAULT_RESOURCE_TTL,
            absent_policy: AbsentPolicy::default(),
            codec: Codec::default(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_resource_ttl(mut self, ttl: Duration) -> Self {
        self.resource_ttl = ttl;
        self
    }

    pub fn with_absent_policy(mut self, policy: AbsentPolicy) -> Self {
        self.absent_policy = policy;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
}
