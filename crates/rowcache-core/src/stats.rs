//! Cache counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    populates: AtomicU64,
    absents: AtomicU64,
    errors: AtomicU64,
}

impl CacheCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn populated(&self) {
        self.populates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn absent(&self) {
        self.absents.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, coalesced: u64, in_flight: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            populates: self.populates.load(Ordering::Relaxed),
            absents: self.absents.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            coalesced,
            in_flight,
        }
    }
}

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Leader lookups answered by the key/value store.
    pub hits: u64,
    /// Leader lookups that found nothing in the key/value store.
    pub misses: u64,
    /// Entries written through after a successful populate.
    pub populates: u64,
    /// Populates that found no row.
    pub absents: u64,
    /// Store, backend and serialization failures.
    pub errors: u64,
    /// Callers that waited on another caller's populate.
    pub coalesced: u64,
    /// Keys with a populate running right now.
    pub in_flight: usize,
}

impl CacheStats {
    /// Fraction of leader lookups served from the cache (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
