//! Cache store factory for runtime selection

use std::sync::Arc;
use std::time::Duration;

use crate::domain::DomainError;
use crate::domain::cache::CacheStore;

use super::in_memory::{InMemoryCacheConfig, InMemoryCacheStore};
use super::redis::{RedisCacheConfig, RedisCacheStore};

/// Supported cache store kinds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheStoreKind {
    /// In-process cache using moka
    #[default]
    InMemory,
    /// Shared Redis cache
    Redis,
}

impl std::fmt::Display for CacheStoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory => write!(f, "in_memory"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for CacheStoreKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            "redis" => Ok(Self::Redis),
            _ => Err(DomainError::configuration(format!(
                "unknown cache store kind: {s}. Valid kinds: in_memory, redis"
            ))),
        }
    }
}

/// Configuration for the cache store factory
#[derive(Debug, Clone, Default)]
pub struct CacheStoreConfig {
    /// Kind of store to create
    pub kind: CacheStoreKind,
    /// Redis URL (required for the Redis kind)
    pub redis_url: Option<String>,
    /// Key prefix for namespacing (Redis)
    pub key_prefix: Option<String>,
    /// Optional TTL applied to written entries
    pub time_to_live: Option<Duration>,
    /// Maximum capacity (in-memory)
    pub max_capacity: Option<u64>,
}

impl CacheStoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            kind: CacheStoreKind::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }
}

/// Creates cache stores from configuration
#[derive(Debug, Default)]
pub struct CacheStoreFactory;

impl CacheStoreFactory {
    pub async fn create(config: &CacheStoreConfig) -> Result<Arc<dyn CacheStore>, DomainError> {
        match config.kind {
            CacheStoreKind::InMemory => {
                let mut mem_config = InMemoryCacheConfig::default();
                if let Some(capacity) = config.max_capacity {
                    mem_config = mem_config.with_max_capacity(capacity);
                }
                if let Some(ttl) = config.time_to_live {
                    mem_config = mem_config.with_time_to_live(ttl);
                }
                Ok(Arc::new(InMemoryCacheStore::with_config(mem_config)))
            }
            CacheStoreKind::Redis => {
                let url = config.redis_url.as_ref().ok_or_else(|| {
                    DomainError::configuration("redis_url is required for the redis cache store")
                })?;
                let mut redis_config = RedisCacheConfig::new(url);
                if let Some(prefix) = &config.key_prefix {
                    redis_config = redis_config.with_key_prefix(prefix);
                }
                if let Some(ttl) = config.time_to_live {
                    redis_config = redis_config.with_time_to_live(ttl);
                }
                Ok(Arc::new(RedisCacheStore::new(redis_config).await?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            "memory".parse::<CacheStoreKind>().unwrap(),
            CacheStoreKind::InMemory
        );
        assert_eq!(
            "redis".parse::<CacheStoreKind>().unwrap(),
            CacheStoreKind::Redis
        );
        assert!("memcached".parse::<CacheStoreKind>().is_err());
    }

    #[test]
    fn test_kind_display_round_trip() {
        assert_eq!(CacheStoreKind::InMemory.to_string(), "in_memory");
        assert_eq!(CacheStoreKind::Redis.to_string(), "redis");
    }

    #[tokio::test]
    async fn test_create_in_memory_store() {
        let config = CacheStoreConfig::in_memory().with_max_capacity(100);
        let store = CacheStoreFactory::create(&config).await.unwrap();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_redis_config_requires_url() {
        let config = CacheStoreConfig {
            kind: CacheStoreKind::Redis,
            ..Default::default()
        };
        let result = tokio_test::block_on(CacheStoreFactory::create(&config));
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
