//! Redis cache store implementation

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::DomainError;
use crate::domain::cache::CacheStore;

/// Configuration for the Redis cache store
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Optional TTL applied to every written entry
    pub time_to_live: Option<Duration>,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            time_to_live: None,
        }
    }
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
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
}

/// Redis-backed cache store.
///
/// `multi_get` maps to a single `MGET`, so the one-round-trip-per-batch
/// invariant of the resolver holds on the wire. Connection pooling via
/// `ConnectionManager`.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCacheStore {
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("failed to create Redis client: {e}")))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("failed to connect to Redis: {e}")))?;

        Ok(Self { connection, config })
    }

    pub async fn with_url(url: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(RedisCacheConfig::new(url)).await
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn multi_get(&self, keys: &[String]) -> Result<HashMap<String, String>, DomainError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let prefixed: Vec<String> = keys.iter().map(|k| self.prefix_key(k)).collect();
        let mut conn = self.connection.clone();

        // MGET preserves argument order and yields nil for absent keys.
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&prefixed)
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("failed to multi-get {} keys: {e}", keys.len())))?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key.clone(), v)))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: Option<String> = conn
            .get(&prefixed_key)
            .await
            .map_err(|e| DomainError::cache(format!("failed to get key '{key}': {e}")))?;

        Ok(result)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: Result<(), redis::RedisError> = match self.config.time_to_live {
            Some(ttl) => {
                conn.set_ex(&prefixed_key, value, ttl.as_secs().max(1))
                    .await
            }
            None => conn.set(&prefixed_key, value).await,
        };

        result.map_err(|e| DomainError::cache(format!("failed to set key '{key}': {e}")))
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i32 = conn
            .del(&prefixed_key)
            .await
            .map_err(|e| DomainError::cache(format!("failed to delete key '{key}': {e}")))?;

        Ok(deleted > 0)
    }
}
