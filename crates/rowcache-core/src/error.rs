//! Error types for rowcache

use rowcache_types::KeyError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Every failure the cache can surface.
///
/// Payloads are rendered messages rather than source errors so the type is
/// `Clone`: a coalesced leader hands the same error to each follower.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Key/value store error: {0}")]
    Store(String),

    #[error("Backing store error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Computation failed: {0}")]
    Compute(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl CacheError {
    /// Transport failures of either store. A caller may retry these.
    pub fn is_transient(&self) -> bool {
        matches!(self, CacheError::Store(_) | CacheError::Backend(_))
    }
}

impl From<KeyError> for CacheError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::InvalidIdentifier(name) => CacheError::InvalidIdentifier(name),
            other => CacheError::InvalidKey(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CacheError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CacheError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}
