//! Relationship descriptors with per-instance resolved slots
//!
//! Each descriptor is embedded in an owning entity struct for one
//! relationship attribute and resolves its target through a
//! [`EntityResolver`]. After the first successful resolution the value is
//! served from an instance-local slot with zero cache or backend access.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::DomainError;
use crate::domain::entity::{Entity, EntityRef, PrimaryKey};
use crate::domain::resolver::EntityResolver;

/// Per-instance memory cell holding an already-resolved relationship target.
///
/// Filled at most once per instance lifetime by the first resolution; `None`
/// inside the filled cell is the resolved-to-absent sentinel. Explicit
/// assignment through a `&mut` setter replaces the whole cell. Concurrent
/// first reads may race to fill it; the loser's value is dropped, which is
/// benign because both carry equivalent data.
#[derive(Debug, Clone)]
pub struct ResolvedSlot<T>(OnceLock<Option<T>>);

impl<T> Default for ResolvedSlot<T> {
    fn default() -> Self {
        Self(OnceLock::new())
    }
}

impl<T: Clone> ResolvedSlot<T> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn resolved(value: Option<T>) -> Self {
        Self(OnceLock::from(value))
    }

    /// Outer `None` means not yet resolved; inner `None` means resolved to
    /// absent.
    pub fn get(&self) -> Option<Option<T>> {
        self.0.get().cloned()
    }

    pub fn fill(&self, value: Option<T>) {
        let _ = self.0.set(value);
    }

    pub fn is_resolved(&self) -> bool {
        self.0.get().is_some()
    }
}

/// Direct reference to an entity of a fixed target type.
///
/// Only the foreign key is persisted; the slot never leaves the instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Related<E: Entity> {
    key: Option<PrimaryKey>,
    #[serde(skip)]
    slot: ResolvedSlot<E>,
}

impl<E: Entity> Default for Related<E> {
    fn default() -> Self {
        Self::none()
    }
}

impl<E: Entity> Related<E> {
    pub fn none() -> Self {
        Self {
            key: None,
            slot: ResolvedSlot::empty(),
        }
    }

    pub fn to(pk: impl Into<PrimaryKey>) -> Self {
        Self {
            key: Some(pk.into()),
            slot: ResolvedSlot::empty(),
        }
    }

    /// The stored foreign key, if any.
    pub fn key(&self) -> Option<&PrimaryKey> {
        self.key.as_ref()
    }

    /// Assigns a new target: updates the stored key and the slot
    /// synchronously, so an immediately following read observes the
    /// assigned value without any resolver call.
    pub fn set(&mut self, entity: E) {
        self.key = Some(entity.primary_key());
        self.slot = ResolvedSlot::resolved(Some(entity));
    }

    /// Clears the reference; subsequent reads short-circuit to absent.
    pub fn clear(&mut self) {
        self.key = None;
        self.slot = ResolvedSlot::resolved(None);
    }

    /// Resolves the target entity.
    ///
    /// Slot hit returns with zero I/O. An empty key short-circuits to
    /// `Ok(None)` without a resolver call. A key that resolves to nothing is
    /// `NotFound`; the slot stays unfilled in that case so a later read
    /// retries after the target appears.
    pub async fn load(&self, resolver: &dyn EntityResolver) -> Result<Option<E>, DomainError> {
        if let Some(cached) = self.slot.get() {
            return Ok(cached);
        }

        let Some(pk) = &self.key else {
            self.slot.fill(None);
            return Ok(None);
        };

        let entity_ref = EntityRef::new(E::type_tag(), pk.clone());
        let value = resolver
            .resolve(&entity_ref)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("related entity '{entity_ref}' not found"))
            })?;
        let entity: E = serde_json::from_value(value).map_err(|e| {
            DomainError::serialization(format!(
                "failed to deserialize related entity '{entity_ref}': {e}"
            ))
        })?;

        self.slot.fill(Some(entity.clone()));
        Ok(Some(entity))
    }
}

impl<E: Entity> From<&E> for Related<E> {
    fn from(entity: &E) -> Self {
        Self {
            key: Some(entity.primary_key()),
            slot: ResolvedSlot::resolved(Some(entity.clone())),
        }
    }
}

/// Polymorphic reference: the target's type tag is stored alongside its
/// primary key on the owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolyRelated {
    target: Option<EntityRef>,
    #[serde(skip)]
    slot: ResolvedSlot<Value>,
}

impl PolyRelated {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn to(target: EntityRef) -> Self {
        Self {
            target: Some(target),
            slot: ResolvedSlot::empty(),
        }
    }

    pub fn target(&self) -> Option<&EntityRef> {
        self.target.as_ref()
    }

    /// Assigns a new target entity, updating both the stored (tag, pk) pair
    /// and the slot.
    pub fn set<E: Entity>(&mut self, entity: &E) -> Result<(), DomainError> {
        let row_data = serde_json::to_value(entity).map_err(|e| {
            DomainError::serialization(format!(
                "failed to serialize entity '{}': {e}",
                E::type_tag()
            ))
        })?;
        self.target = Some(entity.entity_ref());
        self.slot = ResolvedSlot::resolved(Some(row_data));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.target = None;
        self.slot = ResolvedSlot::resolved(None);
    }

    /// Resolves the raw payload of the target, whatever its type.
    pub async fn load(&self, resolver: &dyn EntityResolver) -> Result<Option<Value>, DomainError> {
        if let Some(cached) = self.slot.get() {
            return Ok(cached);
        }

        let Some(target) = &self.target else {
            self.slot.fill(None);
            return Ok(None);
        };

        let value = resolver.resolve(target).await?.ok_or_else(|| {
            DomainError::not_found(format!("related entity '{target}' not found"))
        })?;

        self.slot.fill(Some(value.clone()));
        Ok(Some(value))
    }

    /// Resolves and deserializes the target as `E`, verifying the stored
    /// type tag first.
    pub async fn load_as<E: Entity>(
        &self,
        resolver: &dyn EntityResolver,
    ) -> Result<Option<E>, DomainError> {
        if let Some(target) = &self.target
            && *target.tag() != E::type_tag()
        {
            return Err(DomainError::validation(format!(
                "polymorphic reference points at '{}', requested '{}'",
                target.tag(),
                E::type_tag()
            )));
        }

        match self.load(resolver).await? {
            Some(value) => {
                let entity: E = serde_json::from_value(value).map_err(|e| {
                    DomainError::serialization(format!(
                        "failed to deserialize related entity as '{}': {e}",
                        E::type_tag()
                    ))
                })?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }
}

/// Reverse single-valued reference: the related entity holds the foreign key
/// pointing back at the owner.
///
/// Carries no persisted state; the foreign key field name is supplied by the
/// owner's accessor at the call site. Mark the field `#[serde(skip)]` in the
/// owning struct.
#[derive(Clone)]
pub struct ReverseRelated<E: Entity> {
    slot: ResolvedSlot<E>,
}

impl<E: Entity> fmt::Debug for ReverseRelated<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReverseRelated")
            .field("resolved", &self.slot.is_resolved())
            .finish()
    }
}

impl<E: Entity> Default for ReverseRelated<E> {
    fn default() -> Self {
        Self {
            slot: ResolvedSlot::empty(),
        }
    }
}

impl<E: Entity> ReverseRelated<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the unique related entity whose `fk_field` equals the
    /// owner's primary key. An absent related row is `Ok(None)` and is
    /// remembered in the slot.
    pub async fn load(
        &self,
        resolver: &dyn EntityResolver,
        fk_field: &str,
        owner: &PrimaryKey,
    ) -> Result<Option<E>, DomainError> {
        if let Some(cached) = self.slot.get() {
            return Ok(cached);
        }

        match resolver
            .resolve_reverse(&E::type_tag(), fk_field, owner)
            .await?
        {
            Some(value) => {
                let entity: E = serde_json::from_value(value).map_err(|e| {
                    DomainError::serialization(format!(
                        "failed to deserialize related entity '{}': {e}",
                        E::type_tag()
                    ))
                })?;
                self.slot.fill(Some(entity.clone()));
                Ok(Some(entity))
            }
            None => {
                self.slot.fill(None);
                Ok(None)
            }
        }
    }

    /// Stores an already-known related entity, e.g. right after creating it.
    pub fn set(&mut self, entity: E) {
        self.slot = ResolvedSlot::resolved(Some(entity));
    }

    /// Discards the slot so the next read resolves again.
    pub fn reset(&mut self) {
        self.slot = ResolvedSlot::empty();
    }
}
