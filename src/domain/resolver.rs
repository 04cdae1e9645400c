//! Resolver seam the relationship descriptors call through

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::DomainError;
use crate::domain::entity::{EntityRef, PrimaryKey, TypeTag};

/// Resolves entity references to their serialized payloads.
///
/// Implemented by the batch resolver; relationship descriptors depend on
/// this trait only, so they stay testable against a stub.
#[async_trait]
pub trait EntityResolver: Send + Sync + Debug {
    /// Resolves one reference; `None` means the entity does not exist.
    async fn resolve(&self, entity_ref: &EntityRef) -> Result<Option<Value>, DomainError>;

    /// Resolves the unique entity of `tag` whose `fk_field` points back at
    /// `owner`, caching it like a forward reference.
    async fn resolve_reverse(
        &self,
        tag: &TypeTag,
        fk_field: &str,
        owner: &PrimaryKey,
    ) -> Result<Option<Value>, DomainError>;
}
