//! Rowcache Core Library
//!
//! Read-through caching with per-key request coalescing. A [`CacheEngine`]
//! owns the key/value store handle, the codec and the in-flight table; the
//! [`ResourceCache`] and [`ComputeCache`] façades share one engine.

// Re-export pure types from rowcache-types
pub use rowcache_types::*;

pub mod coalescer;
pub mod codec;
pub mod compute;
pub mod config;
pub mod engine;
pub mod error;
pub mod ports;
pub mod resource;
pub mod stats;

pub use coalescer::Coalescer;
pub use codec::Codec;
pub use compute::ComputeCache;
pub use config::{AbsentPolicy, CacheConfig, DEFAULT_NAMESPACE, DEFAULT_RESOURCE_TTL};
pub use engine::{CacheEngine, PopulateResult};
pub use error::{CacheError, Result};
pub use ports::{BackingStore, KeyValueStore};
pub use resource::ResourceCache;
pub use stats::CacheStats;

use std::sync::Arc;

/// Client handles built once at startup and passed to whoever needs them.
#[derive(Clone)]
pub struct Caches {
    pub resources: ResourceCache,
    pub computed: ComputeCache,
}

impl Caches {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn BackingStore>,
        config: CacheConfig,
    ) -> Self {
        let engine = Arc::new(CacheEngine::new(store, config));
        Self {
            resources: ResourceCache::new(engine.clone(), backend),
            computed: ComputeCache::new(engine),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.resources.engine().stats()
    }
}
