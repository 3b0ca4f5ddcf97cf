//! Canonicalization keys.
//!
//! Two host objects are one image object iff they have the same runtime
//! class and equal content: element-wise for byte/char/int/long arrays,
//! deep for reference arrays (identity for embedded non-array objects),
//! and the object's own equality otherwise. Strings compare by content;
//! everything else's "own equality" in this model is identity.
//!
//! The key is built once per lookup as an owned value so the map needs no
//! access back into the host heap.

use strata_core::Kind;
use strata_meta::{ArrayData, HostObject, HostRef, HostValue, MethodId, TypeId, Universe};

/// Content key of a potentially canonicalizable object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalKey {
    /// A string, by class and content.
    Str(TypeId, String),
    /// byte[] by content.
    ByteArray(TypeId, Vec<i8>),
    /// char[] by content.
    CharArray(TypeId, Vec<u16>),
    /// int[] by content.
    IntArray(TypeId, Vec<i32>),
    /// long[] by content.
    LongArray(TypeId, Vec<i64>),
    /// Reference array by deep content.
    RefArray(TypeId, Vec<ElementKey>),
    /// Anything whose own equality is identity.
    Identity(HostRef),
}

/// One element of a reference-array key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKey {
    /// Null element.
    Null,
    /// Primitive element, as kind plus raw bits.
    Prim(Kind, u64),
    /// Word element.
    Word(u64),
    /// Method pointer element.
    Method(MethodId),
    /// Nested array, keyed recursively.
    Array(Box<CanonicalKey>),
    /// Embedded non-array object, by identity.
    Object(HostRef),
}

impl CanonicalKey {
    /// Build the content key for a host object.
    pub fn for_object(universe: &Universe, object: HostRef) -> Self {
        match universe.host().get(object) {
            HostObject::Str { class, value, .. } => CanonicalKey::Str(*class, value.clone()),
            HostObject::Array { class, data } => match data {
                ArrayData::Byte(v) => CanonicalKey::ByteArray(*class, v.clone()),
                ArrayData::Char(v) => CanonicalKey::CharArray(*class, v.clone()),
                ArrayData::Int(v) => CanonicalKey::IntArray(*class, v.clone()),
                ArrayData::Long(v) => CanonicalKey::LongArray(*class, v.clone()),
                ArrayData::Ref(v) => CanonicalKey::RefArray(
                    *class,
                    v.iter()
                        .map(|&value| ElementKey::for_value(universe, value))
                        .collect(),
                ),
                // Other component kinds fall back to the object's own
                // equality, which is identity.
                _ => CanonicalKey::Identity(object),
            },
            _ => CanonicalKey::Identity(object),
        }
    }
}

impl ElementKey {
    fn for_value(universe: &Universe, value: HostValue) -> Self {
        match value {
            HostValue::Null => ElementKey::Null,
            HostValue::Prim(kind, bits) => ElementKey::Prim(kind, bits),
            HostValue::Word(w) => ElementKey::Word(w),
            HostValue::MethodPtr(m) => ElementKey::Method(m),
            HostValue::Ref(r) => match universe.host().get(r) {
                HostObject::Array { .. } => {
                    ElementKey::Array(Box::new(CanonicalKey::for_object(universe, r)))
                }
                _ => ElementKey::Object(r),
            },
        }
    }
}
