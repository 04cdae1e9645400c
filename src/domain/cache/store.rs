//! Cache store trait definition

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::domain::DomainError;

/// Key-value cache store boundary.
///
/// This trait uses JSON strings internally to be dyn-compatible; use
/// [`CacheStoreExt`] for typed get/set. No ordering, transactional or expiry
/// guarantees are assumed beyond "eventually visible to subsequent gets on
/// the same key" - expiry, if any, is purely the implementation's own
/// configuration.
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Fetches many keys in a single round-trip; only present keys appear in
    /// the result.
    async fn multi_get(&self, keys: &[String]) -> Result<HashMap<String, String>, DomainError>;

    /// Fetches a single key.
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut found = self.multi_get(&[key.to_string()]).await?;
        Ok(found.remove(key))
    }

    /// Stores a value under a key, overwriting any existing entry.
    async fn set(&self, key: &str, value: &str) -> Result<(), DomainError>;

    /// Deletes a key, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;
}

/// Extension trait providing typed get/set operations over the raw JSON
/// contract.
pub trait CacheStoreExt: CacheStore {
    fn get_typed<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::serialization(format!(
                            "failed to deserialize cache value: {e}"
                        ))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    fn set_typed<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::serialization(format!("failed to serialize cache value: {e}"))
            })?;
            self.set(key, &data).await
        }
    }
}

// Blanket implementation for all cache stores
impl<T: CacheStore + ?Sized> CacheStoreExt for T {}
