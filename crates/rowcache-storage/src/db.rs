//! SQLite backing store (embedded, no external dependencies)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rowcache_core::{is_identifier, BackingStore, CacheError, Result, Row, Value};
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow, SqliteJournalMode,
    SqliteSynchronous,
};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

type Query<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Pool settings for [`Database::connect`].
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Backing store over an SQLite pool. Rows are fetched with `SELECT *` and
/// decoded column by column into [`Value`]s.
#[derive(Clone)]
pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    /// Connect using an sqlx URL such as `sqlite://data/app.db` or
    /// `sqlite::memory:`.
    pub async fn connect(database_url: &str, options: DatabaseOptions) -> Result<Self> {
        tracing::info!("Connecting to SQLite at: {}", database_url);

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(backend_error)?
            .create_if_missing(true);

        // Every connection to `:memory:` opens its own database, so pin the
        // pool to a single connection that never expires.
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(options.max_connections)
        };
        let pool = pool_options
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect_options)
            .await
            .map_err(backend_error)?;

        tracing::info!("SQLite connection established");
        Ok(Self::from_pool(pool))
    }

    /// Open (creating if needed) a database file in WAL mode.
    pub async fn open(database_path: impl AsRef<Path>) -> Result<Self> {
        let database_path = database_path.as_ref();
        tracing::info!("Opening SQLite database at: {}", database_path.display());

        if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CacheError::Backend(format!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(DatabaseOptions::default().max_connections)
            .connect_with(options)
            .await
            .map_err(backend_error)?;

        tracing::info!("SQLite connection established");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl BackingStore for Database {
    async fn fetch_row(&self, table: &str, pk_column: &str, id: &Value) -> Result<Option<Row>> {
        // Identifiers cannot be bound as parameters; they are quoted after
        // being checked against the identifier grammar.
        for name in [table, pk_column] {
            if !is_identifier(name) {
                return Err(CacheError::InvalidIdentifier(name.to_string()));
            }
        }

        let sql = format!(r#"SELECT * FROM "{table}" WHERE "{pk_column}" = ?1 LIMIT 1"#);
        tracing::debug!(table, pk_column, id = %id, "Fetching row");

        let row = bind_value(sqlx::query(&sql), id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(backend_error)?;

        row.as_ref().map(decode_row).transpose()
    }
}

fn bind_value<'q>(query: Query<'q>, value: &Value) -> Query<'q> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Timestamp(ts) => query.bind(*ts),
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut decoded = Row::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index).map_err(backend_error)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_string();
            decode_value(row, index, column.type_info().name(), &storage)?
        };
        decoded.insert(column.name(), value);
    }
    Ok(decoded)
}

/// Map one non-null cell to a [`Value`].
///
/// SQLite types values dynamically, so the value's storage class decides the
/// variant. Columns declared `BOOLEAN` or `DATETIME`/`TIMESTAMP` are narrowed
/// further when the stored value allows it.
fn decode_value(row: &SqliteRow, index: usize, declared: &str, storage: &str) -> Result<Value> {
    match declared.to_ascii_uppercase().as_str() {
        "BOOLEAN" | "BOOL" if storage == "INTEGER" => {
            return row.try_get::<bool, _>(index).map(Value::Bool).map_err(backend_error);
        }
        "DATETIME" | "TIMESTAMP" => {
            if let Ok(ts) = row.try_get::<DateTime<Utc>, _>(index) {
                return Ok(Value::Timestamp(ts));
            }
        }
        _ => {}
    }

    let value = match storage {
        "INTEGER" => Value::Int(row.try_get::<i64, _>(index).map_err(backend_error)?),
        "REAL" => Value::Float(row.try_get::<f64, _>(index).map_err(backend_error)?),
        "BLOB" => Value::Bytes(row.try_get::<Vec<u8>, _>(index).map_err(backend_error)?),
        _ => Value::Text(row.try_get::<String, _>(index).map_err(backend_error)?),
    };
    Ok(value)
}

fn backend_error(err: sqlx::Error) -> CacheError {
    CacheError::Backend(err.to_string())
}
