//! In-memory backend implementation

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::DomainError;
use crate::domain::backend::{Backend, RawRow};
use crate::domain::entity::{Entity, PrimaryKey, TypeTag};

/// Thread-safe in-memory backend.
///
/// Useful for testing and development. Data is lost when the process
/// terminates.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    // tag -> canonical pk -> payload
    rows: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with entities of one type.
    pub fn with_entities<E: Entity>(entities: Vec<E>) -> Result<Self, DomainError> {
        let backend = Self::new();
        for entity in &entities {
            backend.insert(&E::type_tag(), RawRow::from_entity(entity)?);
        }
        Ok(backend)
    }

    /// Inserts a row directly, bypassing the upsert trait method.
    pub fn insert(&self, tag: &TypeTag, row: RawRow) {
        self.rows
            .write()
            .unwrap()
            .entry(tag.as_str().to_string())
            .or_default()
            .insert(row.primary_key.canonical(), row.data);
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn fetch_by_primary_keys(
        &self,
        tag: &TypeTag,
        pks: &[PrimaryKey],
    ) -> Result<Vec<RawRow>, DomainError> {
        let rows = self.rows.read().unwrap();
        let Some(of_type) = rows.get(tag.as_str()) else {
            return Ok(Vec::new());
        };

        Ok(pks
            .iter()
            .filter_map(|pk| {
                of_type
                    .get(&pk.canonical())
                    .map(|data| RawRow::new(pk.clone(), data.clone()))
            })
            .collect())
    }

    async fn fetch_by_foreign_key(
        &self,
        tag: &TypeTag,
        fk_field: &str,
        owner: &PrimaryKey,
    ) -> Result<Option<RawRow>, DomainError> {
        let rows = self.rows.read().unwrap();
        let Some(of_type) = rows.get(tag.as_str()) else {
            return Ok(None);
        };

        Ok(of_type
            .iter()
            .find(|(_, data)| {
                data.get(fk_field)
                    .is_some_and(|v| owner.matches_json(v))
            })
            .map(|(pk, data)| RawRow::new(pk.as_str(), data.clone())))
    }

    async fn upsert(&self, tag: &TypeTag, row: RawRow) -> Result<(), DomainError> {
        self.insert(tag, row);
        Ok(())
    }

    async fn delete(&self, tag: &TypeTag, pk: &PrimaryKey) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().unwrap();
        Ok(rows
            .get_mut(tag.as_str())
            .is_some_and(|of_type| of_type.remove(&pk.canonical()).is_some()))
    }
}
