//! Get command - Read a row through the cache

use super::parse_id;
use anyhow::{Context, Result};
use colored::Colorize;
use rowcache_core::ResourceCache;

pub async fn run(cache: &ResourceCache, table: &str, id: &str, pk_column: &str) -> Result<()> {
    let row = cache
        .get(table, pk_column, parse_id(id))
        .await
        .with_context(|| format!("Failed to load {}:{}", table, id))?;

    if row.is_empty() {
        eprintln!("{} No row in {} with {} = {}", "∅".yellow(), table, pk_column, id);
        println!("null");
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&row.to_json())?);
    Ok(())
}
