//! Backend store boundary - the relational collaborator behind the cache

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::DomainError;
use crate::domain::entity::{Entity, PrimaryKey, TypeTag};

/// One row fetched from or written to the backing store: the entity's
/// primary key plus its serialized payload.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub primary_key: PrimaryKey,
    pub data: Value,
}

impl RawRow {
    pub fn new(primary_key: impl Into<PrimaryKey>, data: Value) -> Self {
        Self {
            primary_key: primary_key.into(),
            data,
        }
    }

    pub fn from_entity<E: Entity>(entity: &E) -> Result<Self, DomainError> {
        let data = serde_json::to_value(entity).map_err(|e| {
            DomainError::serialization(format!(
                "failed to serialize entity '{}': {e}",
                E::type_tag()
            ))
        })?;
        Ok(Self {
            primary_key: entity.primary_key(),
            data,
        })
    }
}

/// Backing relational store, reached through its own timeout/retry policy.
///
/// Errors from this boundary always propagate to callers unchanged; the
/// cache layer never absorbs them.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Fetches existing rows of one type by primary key; missing keys are
    /// simply absent from the result. One call covers arbitrarily many keys
    /// (an `IN`-list style fetch).
    async fn fetch_by_primary_keys(
        &self,
        tag: &TypeTag,
        pks: &[PrimaryKey],
    ) -> Result<Vec<RawRow>, DomainError>;

    /// Fetches the unique row of `tag` whose `fk_field` equals `owner`, for
    /// reverse single-valued references.
    async fn fetch_by_foreign_key(
        &self,
        tag: &TypeTag,
        fk_field: &str,
        owner: &PrimaryKey,
    ) -> Result<Option<RawRow>, DomainError>;

    /// Creates or replaces a row.
    async fn upsert(&self, tag: &TypeTag, row: RawRow) -> Result<(), DomainError>;

    /// Deletes a row, returning whether it existed.
    async fn delete(&self, tag: &TypeTag, pk: &PrimaryKey) -> Result<bool, DomainError>;
}
