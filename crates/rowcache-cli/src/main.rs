//! Rowcache CLI
//!
//! Reads rows through the cache, refreshes and invalidates entries.

mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rowcache_core::{BackingStore, Caches, KeyValueStore};
use rowcache_storage::{Database, MemoryCache, RedisCache};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "rowcache")]
#[command(author, version, about = "Read-through row cache over SQLite with Redis or in-memory storage", long_about = None)]
#[command(after_help = "Without a redis_url the cache lives only inside one process, so \
refresh, delete and exists see an empty cache on every run. Set redis_url \
(or ROWCACHE_REDIS_URL) to share entries between runs.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (defaults to ./rowcache.toml when present)
    #[arg(short, long, global = true, env = "ROWCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Print cache statistics to stderr when the command finishes
    #[arg(long, global = true)]
    stats: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a row, loading it from the database on a miss
    Get {
        table: String,
        id: String,

        /// Primary key column
        #[arg(long = "pk", default_value = "id")]
        pk_column: String,
    },

    /// Reload a row from the database and overwrite its cache entry.
    /// Needs redis_url to outlive the process
    Refresh {
        table: String,
        id: String,

        /// Primary key column
        #[arg(long = "pk", default_value = "id")]
        pk_column: String,
    },

    /// Invalidate cached rows. Needs redis_url to have any effect
    Delete {
        table: String,

        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Check whether a row is cached. Always false without redis_url
    Exists { table: String, id: String },
}

impl Commands {
    /// Whether the command only means something against a cache shared
    /// between runs.
    fn needs_shared_cache(&self) -> bool {
        !matches!(self, Commands::Get { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            Commands::Get { .. } => "get",
            Commands::Refresh { .. } => "refresh",
            Commands::Delete { .. } => "delete",
            Commands::Exists { .. } => "exists",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_filter = if cli.verbose {
        "rowcache=debug,rowcache_core=debug,rowcache_storage=debug"
    } else {
        "rowcache=info,rowcache_core=info,rowcache_storage=info"
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let result = run(cli).await;

    if let Err(ref e) = result {
        error!("Command failed: {:#}", e);
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    result
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if settings.redis_url.is_none() && cli.command.needs_shared_cache() {
        warn!(
            "'{}' runs against a fresh in-memory cache; set redis_url to share entries between runs",
            cli.command.name()
        );
        eprintln!(
            "{} no redis_url configured, so '{}' only sees this process's empty in-memory cache",
            "Warning:".yellow().bold(),
            cli.command.name()
        );
    }
    let caches = connect(&settings).await?;

    match cli.command {
        Commands::Get {
            table,
            id,
            pk_column,
        } => commands::get::run(&caches.resources, &table, &id, &pk_column).await?,
        Commands::Refresh {
            table,
            id,
            pk_column,
        } => commands::refresh::run(&caches.resources, &table, &id, &pk_column).await?,
        Commands::Delete { table, ids } => {
            commands::delete::run(&caches.resources, &table, &ids).await?
        }
        Commands::Exists { table, id } => {
            commands::exists::run(&caches.resources, &table, &id).await?
        }
    }

    if cli.stats {
        eprintln!("{}", serde_json::to_string_pretty(&caches.stats())?);
    }
    Ok(())
}

async fn connect(settings: &Settings) -> Result<Caches> {
    let store: Arc<dyn KeyValueStore> = match &settings.redis_url {
        Some(url) => Arc::new(
            RedisCache::connect_with_timeout(url, settings.connect_timeout())
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            info!("No Redis URL configured, using in-memory cache");
            Arc::new(MemoryCache::new())
        }
    };

    let backend: Arc<dyn BackingStore> = Arc::new(
        Database::connect(&settings.database_url, settings.database_options())
            .await
            .with_context(|| format!("Failed to open database {}", settings.database_url))?,
    );

    Ok(Caches::new(store, backend, settings.cache_config()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rowcache").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cache_only_commands_need_shared_cache() {
        assert!(!parse(&["get", "users", "1"]).command.needs_shared_cache());
        assert!(parse(&["refresh", "users", "1"]).command.needs_shared_cache());
        assert!(parse(&["delete", "users", "1", "2"]).command.needs_shared_cache());
        assert!(parse(&["exists", "users", "1"]).command.needs_shared_cache());
    }

    #[test]
    fn test_help_mentions_in_memory_fallback() {
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("Without a redis_url"), "{}", help);
        Cli::command().debug_assert();
    }
}
