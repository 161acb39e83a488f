//! Row-level cache-aside view over named tables

use crate::engine::{CacheEngine, PopulateResult};
use crate::error::{CacheError, Result};
use crate::ports::BackingStore;
use bytes::Bytes;
use rowcache_types::{is_identifier, CacheKey, Row, Value};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

/// Caches single rows identified by a primary key.
///
/// A missing row is not an error: `get` returns an empty [`Row`] and callers
/// decide what that means for them.
#[derive(Clone)]
pub struct ResourceCache {
    engine: Arc<CacheEngine>,
    backend: Arc<dyn BackingStore>,
}

impl ResourceCache {
    pub fn new(engine: Arc<CacheEngine>, backend: Arc<dyn BackingStore>) -> Self {
        Self { engine, backend }
    }

    pub fn engine(&self) -> &Arc<CacheEngine> {
        &self.engine
    }

    /// Fetch the row of `table` whose `pk_column` equals `id`, reading
    /// through to the backing store on a miss.
    pub async fn get(&self, table: &str, pk_column: &str, id: impl Into<Value>) -> Result<Row> {
        let id = id.into();
        validate_column(pk_column)?;
        let key = self.key(table, &id)?;

        let payload = self
            .engine
            .read_through(&key, self.engine.config().resource_ttl, || {
                self.load(table, pk_column, &id)
            })
            .await?;

        self.decode(payload)
    }

    /// Like [`get`](Self::get), converting the row into `T`. `None` when the
    /// row does not exist.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        table: &str,
        pk_column: &str,
        id: impl Into<Value>,
    ) -> Result<Option<T>> {
        let row = self.get(table, pk_column, id).await?;
        if row.is_empty() {
            return Ok(None);
        }
        Ok(Some(row.deserialize()?))
    }

    /// Re-read the row from the backing store and overwrite the cache entry.
    /// Returns whether the row exists.
    pub async fn set(&self, table: &str, pk_column: &str, id: impl Into<Value>) -> Result<bool> {
        let id = id.into();
        validate_column(pk_column)?;
        let key = self.key(table, &id)?;

        let payload = self
            .engine
            .write_through(&key, self.engine.config().resource_ttl, || {
                self.load(table, pk_column, &id)
            })
            .await?;

        Ok(payload.is_some())
    }

    /// Drop the cache entries for `ids`. An empty list is a no-op, and ids
    /// that were never cached are not an error.
    pub async fn delete<I, V>(&self, table: &str, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let keys = ids
            .into_iter()
            .map(|id| self.key(table, &id.into()))
            .collect::<Result<Vec<_>>>()?;
        if keys.is_empty() {
            return Ok(());
        }

        let removed = self.engine.invalidate(&keys).await?;
        info!("Deleted {} cached rows from {}", removed, table);
        Ok(())
    }

    /// Whether an entry for the row is currently cached. Does not consult the
    /// backing store.
    pub async fn exists(&self, table: &str, id: impl Into<Value>) -> Result<bool> {
        let key = self.key(table, &id.into())?;
        self.engine.contains(&key).await
    }

    fn key(&self, table: &str, id: &Value) -> Result<CacheKey> {
        Ok(CacheKey::resource(self.engine.namespace(), table, id)?)
    }

    async fn load(&self, table: &str, pk_column: &str, id: &Value) -> Result<PopulateResult> {
        debug!("Querying {} where {} = {}", table, pk_column, id);
        match self.backend.fetch_row(table, pk_column, id).await? {
            Some(row) => {
                let payload = self.engine.codec().encode_checked(&row)?;
                Ok(PopulateResult::Found(Bytes::from(payload)))
            }
            None => Ok(PopulateResult::Absent),
        }
    }

    fn decode(&self, payload: Option<Bytes>) -> Result<Row> {
        match payload {
            Some(bytes) => self.engine.codec().decode(&bytes),
            None => Ok(Row::new()),
        }
    }
}

fn validate_column(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(CacheError::InvalidIdentifier(name.to_string()))
    }
}
