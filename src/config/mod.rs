//! Layer configuration loaded from files and the environment

use std::time::Duration;

use serde::Deserialize;

use crate::domain::DomainError;
use crate::infrastructure::cache::{CacheStoreConfig, CacheStoreKind};
use crate::infrastructure::backend::PostgresConfig;

/// Cache layer configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheLayerConfig {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub backend: BackendSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// "in_memory" or "redis"
    pub kind: String,
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    pub ttl_secs: Option<u64>,
    pub max_capacity: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            kind: "in_memory".to_string(),
            redis_url: None,
            key_prefix: None,
            ttl_secs: None,
            max_capacity: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    pub url: String,
    pub table_name: String,
    pub max_connections: u32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/objident_cache".to_string(),
            table_name: "entities".to_string(),
            max_connections: 10,
        }
    }
}

impl CacheLayerConfig {
    /// Loads configuration from `config/default`, `config/local` and
    /// `OBJCACHE_`-prefixed environment variables, later sources overriding
    /// earlier ones.
    pub fn load() -> Result<Self, DomainError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("OBJCACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| DomainError::configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| DomainError::configuration(e.to_string()))
    }
}

impl CacheSettings {
    /// Converts the settings into a factory configuration.
    pub fn to_store_config(&self) -> Result<CacheStoreConfig, DomainError> {
        let kind: CacheStoreKind = self.kind.parse()?;
        Ok(CacheStoreConfig {
            kind,
            redis_url: self.redis_url.clone(),
            key_prefix: self.key_prefix.clone(),
            time_to_live: self.ttl_secs.map(Duration::from_secs),
            max_capacity: self.max_capacity,
        })
    }
}

impl BackendSettings {
    pub fn to_postgres_config(&self) -> PostgresConfig {
        PostgresConfig::new(&self.url).with_max_connections(self.max_connections)
    }
}
