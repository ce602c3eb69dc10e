//! Lenient decoding for enums stored as raw string tags.
//!
//! Programs written by older app versions (or edited by hand) may carry tags
//! this build does not know. Decoding such a tag never fails: it substitutes
//! the type's documented fallback variant and emits a warning.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserializer, Serializer};

/// An enum persisted as a lowercase string tag with a fallback variant.
pub trait StoredTag: Sized + Copy + 'static {
    /// Variant substituted for unknown or malformed tags.
    const FALLBACK: Self;

    /// Human-readable name of the tag family, used in log messages.
    const KIND: &'static str;

    /// The canonical on-disk tag for this variant.
    fn as_tag(&self) -> &'static str;

    /// Parse a known tag. Matching is case-insensitive and ignores
    /// surrounding whitespace.
    fn from_tag(tag: &str) -> Option<Self>;

    /// Parse a tag, falling back to [`StoredTag::FALLBACK`] when unknown.
    fn from_tag_lossy(tag: &str) -> Self {
        match Self::from_tag(tag) {
            Some(value) => value,
            None => {
                tracing::warn!(
                    kind = Self::KIND,
                    tag,
                    fallback = Self::FALLBACK.as_tag(),
                    "unknown stored tag, substituting fallback"
                );
                Self::FALLBACK
            }
        }
    }
}

/// Serialize a stored tag as its canonical string.
pub fn serialize<T: StoredTag, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_tag())
}

/// Deserialize a stored tag, accepting any value shape.
///
/// Strings are parsed with [`StoredTag::from_tag_lossy`]. Any other value
/// (numbers, booleans, null, nested structures) decodes to the fallback.
pub fn deserialize<'de, T: StoredTag, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<T, D::Error> {
    deserializer.deserialize_any(TagVisitor(PhantomData))
}

struct TagVisitor<T>(PhantomData<T>);

impl<T: StoredTag> TagVisitor<T> {
    fn malformed(&self, shape: &str) -> T {
        tracing::warn!(
            kind = T::KIND,
            shape,
            fallback = T::FALLBACK.as_tag(),
            "stored tag is not a string, substituting fallback"
        );
        T::FALLBACK
    }
}

impl<'de, T: StoredTag> Visitor<'de> for TagVisitor<T> {
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a {} tag", T::KIND)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        Ok(T::from_tag_lossy(v))
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<T, E> {
        Ok(self.malformed("bool"))
    }

    fn visit_i64<E: de::Error>(self, _v: i64) -> Result<T, E> {
        Ok(self.malformed("integer"))
    }

    fn visit_u64<E: de::Error>(self, _v: u64) -> Result<T, E> {
        Ok(self.malformed("integer"))
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<T, E> {
        Ok(self.malformed("float"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<T, E> {
        Ok(self.malformed("null"))
    }

    fn visit_none<E: de::Error>(self) -> Result<T, E> {
        Ok(self.malformed("null"))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<T, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<T, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(self.malformed("sequence"))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<T, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(self.malformed("map"))
    }
}

/// Implement `Serialize`, `Deserialize`, `Display` and `FromStr` for a
/// [`StoredTag`] type.
macro_rules! stored_tag_impls {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::std::result::Result<S::Ok, S::Error> {
                $crate::core::tag::serialize(self, serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::std::result::Result<Self, D::Error> {
                $crate::core::tag::deserialize(deserializer)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad($crate::core::tag::StoredTag::as_tag(self))
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::error::OverloadError;

            /// Strict parse for user input; stored data goes through the
            /// lenient serde path instead.
            fn from_str(s: &str) -> $crate::error::Result<Self> {
                <$ty as $crate::core::tag::StoredTag>::from_tag(s).ok_or_else(|| {
                    $crate::error::OverloadError::invalid_input(format!(
                        "unknown {} '{}'",
                        <$ty as $crate::core::tag::StoredTag>::KIND,
                        s
                    ))
                })
            }
        }
    };
}

pub(crate) use stored_tag_impls;
