//! Configuration management
//!
//! Settings come from an optional `rowcache.toml` overlaid with `ROWCACHE_*`
//! environment variables.

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use rowcache_core::{
    AbsentPolicy, CacheConfig, Codec, DEFAULT_NAMESPACE, DEFAULT_RESOURCE_TTL,
};
use rowcache_storage::DatabaseOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "ROWCACHE";
pub const DEFAULT_CONFIG_NAME: &str = "rowcache";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Shared key/value store. The in-process cache is used when unset.
    pub redis_url: Option<String>,
    pub database_url: String,
    pub namespace: String,
    pub resource_ttl_secs: u64,
    /// Cache absent rows for this long. Absent rows are not cached when unset.
    pub negative_ttl_secs: Option<u64>,
    pub codec: Codec,
    pub connect_timeout_secs: u64,
    pub max_connections: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: None,
            database_url: "sqlite://rowcache.db".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            resource_ttl_secs: DEFAULT_RESOURCE_TTL.as_secs(),
            negative_ttl_secs: None,
            codec: Codec::default(),
            connect_timeout_secs: 5,
            max_connections: 5,
        }
    }
}

impl Settings {
    /// Load settings from `path` (required) or `./rowcache.toml` (optional),
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    pub fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.namespace.contains(':') {
            anyhow::bail!(
                "Invalid namespace: {:?}. It must be non-empty and contain no ':'",
                self.namespace
            );
        }
        if self.resource_ttl_secs == 0 {
            anyhow::bail!("resource_ttl_secs must be greater than zero");
        }
        if self.negative_ttl_secs == Some(0) {
            anyhow::bail!("negative_ttl_secs must be greater than zero when set");
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        let absent_policy = match self.negative_ttl_secs {
            Some(secs) => AbsentPolicy::Cache {
                ttl: Duration::from_secs(secs),
            },
            None => AbsentPolicy::Skip,
        };

        CacheConfig::new()
            .with_namespace(self.namespace.clone())
            .with_resource_ttl(Duration::from_secs(self.resource_ttl_secs))
            .with_absent_policy(absent_policy)
            .with_codec(self.codec)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            max_connections: self.max_connections,
            acquire_timeout: self.connect_timeout(),
        }
    }
}
