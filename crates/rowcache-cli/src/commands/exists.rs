//! Exists command - Check whether a row is currently cached

use super::parse_id;
use anyhow::{Context, Result};
use rowcache_core::ResourceCache;

pub async fn run(cache: &ResourceCache, table: &str, id: &str) -> Result<()> {
    let cached = cache
        .exists(table, parse_id(id))
        .await
        .with_context(|| format!("Failed to check {}:{}", table, id))?;

    println!("{}", cached);
    Ok(())
}
