//! Domain layer - contracts and value types of the cache layer

pub mod backend;
pub mod cache;
pub mod entity;
pub mod error;
pub mod relation;
pub mod resolver;

pub use backend::{Backend, RawRow};
pub use cache::{CacheStore, CacheStoreExt, KeyScheme};
pub use entity::{Entity, EntityRef, PrimaryKey, TypeTag};
pub use error::DomainError;
pub use relation::{PolyRelated, Related, ResolvedSlot, ReverseRelated};
pub use resolver::EntityResolver;
