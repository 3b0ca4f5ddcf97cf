//! Hybrid object layout.
//!
//! A hybrid class embeds a trailing array and optionally a bit set in the
//! same allocation as its instance fields, so neither is a standalone image
//! object. The memory form is:
//!
//! ```text
//! hub | array length | bit field | instance fields | hash | array elements
//! ```

use crate::universe::{FieldId, HybridInfo, TypeId, Universe};
use strata_core::{Kind, ObjectLayout};

/// Computed layout of one hybrid class. Built once per class and memoized
/// by the builder.
#[derive(Debug, Clone)]
pub struct HybridLayout {
    array_field: FieldId,
    bitset_field: Option<FieldId>,
    array_kind: Kind,
    bit_field_offset: u64,
    array_base_offset: u64,
    element_size: u64,
    alignment: u64,
}

impl HybridLayout {
    /// Compute the layout of a hybrid class from its resolved metadata.
    pub fn new(universe: &Universe, class: TypeId, info: &HybridInfo) -> Self {
        let layout: ObjectLayout = universe.layout();
        let instance = universe
            .image_type(class)
            .instance()
            .unwrap_or_else(|| panic!("hybrid class {} is not an instance class", class.index()));
        let element_size = info.array_kind.size_in_bytes(layout.reference_size);
        // Elements follow the instance fields and the identity hash slot.
        let fields_and_hash_end = instance.hash_code_offset + 4;
        let array_base_offset =
            (fields_and_hash_end + element_size - 1) & !(element_size - 1);
        Self {
            array_field: info.array_field,
            bitset_field: info.bitset_field,
            array_kind: info.array_kind,
            bit_field_offset: layout.array_length_offset + 4,
            array_base_offset,
            element_size,
            alignment: layout.alignment,
        }
    }

    /// The field holding the embedded array.
    #[inline]
    pub fn array_field(&self) -> FieldId {
        self.array_field
    }

    /// The field holding the embedded bit set, if any.
    #[inline]
    pub fn bitset_field(&self) -> Option<FieldId> {
        self.bitset_field
    }

    /// Element kind of the embedded array.
    #[inline]
    pub fn array_element_kind(&self) -> Kind {
        self.array_kind
    }

    /// Offset of the bit field, between the array length and the fields.
    #[inline]
    pub fn bit_field_offset(&self) -> u64 {
        self.bit_field_offset
    }

    /// Offset of embedded array element `index`.
    #[inline]
    pub fn array_element_offset(&self, index: u64) -> u64 {
        self.array_base_offset + index * self.element_size
    }

    /// Total aligned size of a hybrid with an embedded array of `length`.
    pub fn total_size(&self, length: u64) -> u64 {
        let end = self.array_element_offset(length);
        (end + self.alignment - 1) & !(self.alignment - 1)
    }
}
