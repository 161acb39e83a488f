//! Refresh command - Reload a row from the backing store into the cache

use super::parse_id;
use anyhow::{Context, Result};
use colored::Colorize;
use rowcache_core::ResourceCache;

pub async fn run(cache: &ResourceCache, table: &str, id: &str, pk_column: &str) -> Result<()> {
    let found = cache
        .set(table, pk_column, parse_id(id))
        .await
        .with_context(|| format!("Failed to refresh {}:{}", table, id))?;

    if found {
        println!("{} Refreshed {}:{}", "✓".green(), table, id.cyan());
    } else {
        println!(
            "{} {}:{} not found in backing store; cache left unchanged",
            "∅".yellow(),
            table,
            id
        );
    }
    Ok(())
}
