//! References as supplied by API callers.
//!
//! Callers may name an item or area either by its opaque internal identifier
//! or by the integer public code printed on the label. The two forms are kept
//! apart in a tagged union and resolved explicitly at the service boundary.
//!
//! On the wire a JSON integer is a public code and a string must be a valid
//! internal identifier. Tag references are looser: a string that parses as an
//! identifier is an identifier, anything else is a tag name.

use core::fmt;
use core::marker::PhantomData;
use core::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::id::TagId;

/// Reference to an entity by internal id or by public integer code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Reference<T> {
    Internal(T),
    Public(i64),
}

impl<T> From<T> for Reference<T> {
    fn from(id: T) -> Self {
        Reference::Internal(id)
    }
}

impl<T: fmt::Display> fmt::Display for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Internal(id) => fmt::Display::fmt(id, f),
            Reference::Public(code) => write!(f, "#{code}"),
        }
    }
}

impl<T: fmt::Display> Serialize for Reference<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reference::Internal(id) => serializer.collect_str(id),
            Reference::Public(code) => serializer.serialize_i64(*code),
        }
    }
}

struct ReferenceVisitor<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for ReferenceVisitor<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    type Value = Reference<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer public code or an internal identifier string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Reference::Public(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(Reference::Public)
            .map_err(|_| E::custom(format!("public code {v} is out of range")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        T::from_str(v).map(Reference::Internal).map_err(E::custom)
    }
}

impl<'de, T> Deserialize<'de> for Reference<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ReferenceVisitor(PhantomData))
    }
}

/// Reference to a tag by internal id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagRef {
    Id(TagId),
    Name(String),
}

impl TagRef {
    /// Classify a raw string: valid identifiers win, everything else is a name.
    pub fn parse(raw: &str) -> Self {
        match TagId::from_str(raw) {
            Ok(id) => TagRef::Id(id),
            Err(_) => TagRef::Name(raw.to_string()),
        }
    }
}

impl fmt::Display for TagRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagRef::Id(id) => fmt::Display::fmt(id, f),
            TagRef::Name(name) => f.write_str(name),
        }
    }
}

impl Serialize for TagRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TagRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TagRef::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::AreaId;
    use serde_json::json;

    #[test]
    fn integer_is_public_code() {
        let r: Reference<AreaId> = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(r, Reference::Public(42));
    }

    #[test]
    fn uuid_string_is_internal_id() {
        let id = AreaId::new();
        let r: Reference<AreaId> = serde_json::from_value(json!(id.to_string())).unwrap();
        assert_eq!(r, Reference::Internal(id));
    }

    #[test]
    fn garbage_string_is_rejected() {
        let r: Result<Reference<AreaId>, _> = serde_json::from_value(json!("shelf-a"));
        assert!(r.is_err());
    }

    #[test]
    fn fractional_number_is_rejected() {
        let r: Result<Reference<AreaId>, _> = serde_json::from_value(json!(1.5));
        assert!(r.is_err());
    }

    #[test]
    fn tag_ref_classifies_names_and_ids() {
        let id = TagId::new();
        let refs: Vec<TagRef> =
            serde_json::from_value(json!(["red", id.to_string()])).unwrap();
        assert_eq!(refs, vec![TagRef::Name("red".into()), TagRef::Id(id)]);
    }
}
