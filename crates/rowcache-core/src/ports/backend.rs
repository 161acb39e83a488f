//! Backing store port

use crate::Result;
use async_trait::async_trait;
use rowcache_types::{Row, Value};

/// Authoritative (slow) store the cache reads through to.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Fetch the single row of `table` whose `pk_column` equals `id`.
    ///
    /// `Ok(None)` means no such row. Table and column names arrive already
    /// validated as plain identifiers.
    async fn fetch_row(&self, table: &str, pk_column: &str, id: &Value) -> Result<Option<Row>>;
}
