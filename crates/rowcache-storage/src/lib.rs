//! Storage adapters
//!
//! Key/value stores for cached payloads ([`MemoryCache`], [`RedisCache`]) and
//! an SQLite [`Database`] serving as the backing store.

pub mod db;
pub mod memory;
pub mod redis;

pub use db::{Database, DatabaseOptions};
pub use memory::MemoryCache;
pub use self::redis::RedisCache;
