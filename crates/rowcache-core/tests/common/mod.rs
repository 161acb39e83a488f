//! In-test stand-ins for the key/value store and the backing store.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use rowcache_core::{BackingStore, CacheError, KeyValueStore, Result, Row, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// HashMap-backed key/value store that records writes and can be told to fail.
#[derive(Default)]
pub struct MockStore {
    entries: Mutex<HashMap<String, (Bytes, Instant)>>,
    writes: Mutex<Vec<(String, Duration)>>,
    pub gets: AtomicUsize,
    pub dels: AtomicUsize,
    failing: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<(String, Duration)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn raw(&self, key: &str) -> Option<Bytes> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(value, _)| value.clone())
    }

    pub fn insert_raw(&self, key: &str, value: &[u8]) {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            (
                Bytes::copy_from_slice(value),
                Instant::now() + Duration::from_secs(3600),
            ),
        );
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Store("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((_, expires)) if Instant::now() >= *expires => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.check()?;
        self.writes.lock().unwrap().push((key.to_string(), ttl));
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        self.dels.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count() as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self.entries.lock().unwrap().contains_key(key))
    }
}

/// Table-of-rows backing store with configurable latency and a query counter.
pub struct MockBackend {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    latency: Duration,
    pub queries: AtomicUsize,
    failing: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            latency,
            queries: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, table: &str, row: Row) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn update(&self, table: &str, pk_column: &str, row: Row) {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        rows.retain(|r| r.get(pk_column) != row.get(pk_column));
        rows.push(row);
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackingStore for MockBackend {
    async fn fetch_row(&self, table: &str, pk_column: &str, id: &Value) -> Result<Option<Row>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("database is locked".into()));
        }
        Ok(self.tables.lock().unwrap().get(table).and_then(|rows| {
            rows.iter()
                .find(|row| row.get(pk_column) == Some(id))
                .cloned()
        }))
    }
}

pub fn user(id: i64, name: &str) -> Row {
    Row::new().with("id", id).with("name", name)
}
