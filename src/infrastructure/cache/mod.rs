//! Cache infrastructure - cache store implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{CacheStoreConfig, CacheStoreFactory, CacheStoreKind};
pub use in_memory::{InMemoryCacheConfig, InMemoryCacheStore};
pub use redis::{RedisCacheConfig, RedisCacheStore};
