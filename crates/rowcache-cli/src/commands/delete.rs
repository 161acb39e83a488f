//! Delete command - Invalidate cached rows

use super::parse_id;
use anyhow::{Context, Result};
use colored::Colorize;
use rowcache_core::{ResourceCache, Value};

pub async fn run(cache: &ResourceCache, table: &str, ids: &[String]) -> Result<()> {
    let values: Vec<Value> = ids.iter().map(|id| parse_id(id)).collect();
    cache
        .delete(table, values)
        .await
        .with_context(|| format!("Failed to invalidate {} key(s) in {}", ids.len(), table))?;

    println!(
        "{} Invalidated {} key(s) in {}",
        "✓".green(),
        ids.len(),
        table.cyan()
    );
    Ok(())
}
