//! Entity identity model - type tags, primary keys and entity references

use std::fmt;
use std::fmt::Debug;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Stable, opaque identifier for an entity type.
///
/// Consistency across the process is the only requirement; the tag is plain
/// data and never inspected beyond equality and display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Primary key of an entity, unique within a type tag.
///
/// Integer and text representations of the same logical key are normalized
/// at construction: a text key holding a canonical base-10 integer collapses
/// to `Int`, so `PrimaryKey::from(5u64)` and `PrimaryKey::from("5")` are
/// equal and derive the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimaryKey {
    Int(u64),
    Text(String),
}

impl PrimaryKey {
    /// Canonical string form used for cache key derivation.
    pub fn canonical(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    fn normalize(s: &str) -> Self {
        // Only a canonical decimal rendering collapses to Int; "05" stays
        // text so it cannot collide with "5".
        match s.parse::<u64>() {
            Ok(n) if n.to_string() == s => Self::Int(n),
            _ => Self::Text(s.to_string()),
        }
    }

    /// Re-applies normalization to a key built as an enum literal, which
    /// skips the `From` impls.
    fn into_normalized(self) -> Self {
        match self {
            Self::Text(s) => Self::normalize(&s),
            int => int,
        }
    }

    /// Compares a JSON value against this key, matching both the numeric
    /// and string renderings of the same logical key.
    pub fn matches_json(&self, value: &Value) -> bool {
        match value {
            Value::Number(n) => n.as_u64().is_some_and(|n| *self == Self::Int(n)),
            Value::String(s) => *self == Self::from(s.as_str()),
            _ => false,
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for PrimaryKey {
    fn from(n: u64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for PrimaryKey {
    fn from(n: u32) -> Self {
        Self::Int(n.into())
    }
}

impl From<&str> for PrimaryKey {
    fn from(s: &str) -> Self {
        Self::normalize(s)
    }
}

impl From<String> for PrimaryKey {
    fn from(s: String) -> Self {
        Self::normalize(&s)
    }
}

impl Serialize for PrimaryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(n) => serializer.serialize_u64(*n),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for PrimaryKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PrimaryKeyVisitor;

        impl Visitor<'_> for PrimaryKeyVisitor {
            type Value = PrimaryKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an unsigned integer or a string primary key")
            }

            fn visit_u64<E: de::Error>(self, n: u64) -> Result<Self::Value, E> {
                Ok(PrimaryKey::Int(n))
            }

            fn visit_i64<E: de::Error>(self, n: i64) -> Result<Self::Value, E> {
                u64::try_from(n)
                    .map(PrimaryKey::Int)
                    .map_err(|_| E::custom(format!("negative primary key: {n}")))
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
                Ok(PrimaryKey::from(s))
            }
        }

        deserializer.deserialize_any(PrimaryKeyVisitor)
    }
}

/// Reference to one logical entity: a (type tag, primary key) pair.
///
/// Structural equality over the normalized representation; this is the sole
/// input to cache key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    tag: TypeTag,
    pk: PrimaryKey,
}

impl EntityRef {
    pub fn new(tag: TypeTag, pk: impl Into<PrimaryKey>) -> Self {
        Self {
            tag,
            pk: pk.into().into_normalized(),
        }
    }

    pub fn of<E: Entity, K: Into<PrimaryKey>>(pk: K) -> Self {
        Self::new(E::type_tag(), pk)
    }

    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        &self.pk
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.pk)
    }
}

/// Trait for types that participate in the object-identity cache.
///
/// `type_tag` doubles as the type-tag resolver collaborator: it must return
/// the same tag for every instance across the process.
pub trait Entity:
    Clone + Debug + Send + Sync + Serialize + serde::de::DeserializeOwned + 'static
{
    fn type_tag() -> TypeTag;

    fn primary_key(&self) -> PrimaryKey;

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::type_tag(), self.primary_key())
    }
}
