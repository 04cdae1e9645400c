//! Generic memoizer - explicit-key caching for arbitrary computations

use std::future::Future;
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::domain::DomainError;
use crate::domain::cache::CacheStore;

/// Caches the result of an arbitrary computation under an explicit key.
///
/// Unlike the batch resolver, nothing invalidates these entries
/// automatically - the computation's inputs are unknown to the cache layer.
/// Callers needing freshness embed a version token in the key or call
/// [`Memoizer::invalidate`] explicitly. The key must be a pure function of
/// the computation's arguments; a constant key shared across distinct
/// argument sets will collide on one entry.
#[derive(Debug, Clone)]
pub struct Memoizer {
    cache: Arc<dyn CacheStore>,
    namespace: String,
}

impl Memoizer {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            namespace: "memo".to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Returns the cached result for `key`, or runs `compute`, stores its
    /// result and returns it.
    ///
    /// Cache failures degrade to always-compute and are never surfaced; the
    /// computation's own error passes through unchanged.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, compute: F) -> Result<T, DomainError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>> + Send,
    {
        let full_key = self.full_key(key);

        match self.cache.get(&full_key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!(key = %full_key, "memoizer hit");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(key = %full_key, error = %e, "corrupted memo entry, recomputing");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "cache store unavailable, computing directly");
            }
        }

        let value = compute().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&full_key, &raw).await {
                    tracing::warn!(key = %full_key, error = %e, "failed to store memo entry");
                }
            }
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "failed to serialize memo entry");
            }
        }

        Ok(value)
    }

    /// Explicitly deletes a memoized entry. Returns whether it existed; an
    /// unreachable cache store is logged and reported as `false`.
    pub async fn invalidate(&self, key: &str) -> bool {
        let full_key = self.full_key(key);
        match self.cache.delete(&full_key).await {
            Ok(existed) => existed,
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "best-effort memo invalidation failed");
                false
            }
        }
    }
}
