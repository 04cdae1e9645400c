//! objident-cache
//!
//! A batched, type-aware object-identity cache layer between application
//! code and a backing relational store:
//! - fetch one or many entities by (type tag, primary key) with at most one
//!   backend query per distinct type in the batch and one cache round-trip
//!   per batch,
//! - relationship descriptors that resolve lazily and serve repeated reads
//!   on the same instance from a local slot,
//! - precise invalidate-on-write (delete, never overwrite),
//! - an explicit-key memoizer for results not tied to an entity identity.
//!
//! Consistency contract: a cached value can be stale relative to a backend
//! write that bypassed this layer's invalidation path; the staleness window
//! is bounded by the next write through the layer (or the store's own
//! expiry, if configured).

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{BackendSettings, CacheLayerConfig, CacheSettings};
pub use domain::{
    Backend, CacheStore, CacheStoreExt, DomainError, Entity, EntityRef, EntityResolver, KeyScheme,
    PolyRelated, PrimaryKey, RawRow, Related, ResolvedSlot, ReverseRelated, TypeTag,
};
pub use infrastructure::{
    BatchResolver, CacheStoreConfig, CacheStoreFactory, CacheStoreKind, InMemoryBackend,
    InMemoryCacheConfig, InMemoryCacheStore, Memoizer, PostgresBackend, PostgresConfig,
    RedisCacheConfig, RedisCacheStore,
};
