//! Infrastructure layer - cache store, backend and service implementations

pub mod backend;
pub mod cache;
pub mod memo;
pub mod resolver;

pub use backend::{InMemoryBackend, PostgresBackend, PostgresConfig};
pub use cache::{
    CacheStoreConfig, CacheStoreFactory, CacheStoreKind, InMemoryCacheConfig, InMemoryCacheStore,
    RedisCacheConfig, RedisCacheStore,
};
pub use memo::Memoizer;
pub use resolver::BatchResolver;
