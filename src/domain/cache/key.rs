//! Cache key derivation

use crate::domain::entity::EntityRef;

/// Deterministic mapping from an [`EntityRef`] to a cache key string.
///
/// Pure, no I/O. Keys take the form `<prefix>:<type_tag>:<canonical_pk>`;
/// the type tag namespaces keys so distinct types can never collide, and
/// primary key normalization (see [`crate::domain::entity::PrimaryKey`])
/// guarantees equal refs derive equal keys regardless of their native
/// representation.
#[derive(Debug, Clone)]
pub struct KeyScheme {
    prefix: String,
}

impl Default for KeyScheme {
    fn default() -> Self {
        Self {
            prefix: "obj".to_string(),
        }
    }
}

impl KeyScheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the key prefix, e.g. to separate applications sharing one
    /// cache store.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn key_for(&self, entity_ref: &EntityRef) -> String {
        format!(
            "{}:{}:{}",
            self.prefix,
            entity_ref.tag(),
            entity_ref.primary_key().canonical()
        )
    }
}
