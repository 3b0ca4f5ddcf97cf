//! Static-field, runtime-info, and intern-table support records.
//!
//! Static fields have no owning object; their slots live inside two
//! placeholder arrays that are themselves image objects. The runtime-info
//! boundary fields are eight of those slots, patched after the heap is
//! written so the runtime can scan its partitions.

use crate::host::HostRef;
use crate::universe::FieldId;

/// The two placeholder arrays static slots live in.
///
/// The `byte[]` holds every primitive static at its assigned offset; the
/// `Object[]` holds one slot per reference static. Both are traversal roots
/// and both are written empty first, then overwritten with the live static
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticFieldsSupport {
    /// Placeholder `byte[]` for primitive statics.
    pub primitive_fields: HostRef,
    /// Placeholder `Object[]` for reference statics.
    pub reference_fields: HostRef,
}

/// The eight runtime-info slots naming the first and last object of each
/// partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryFields {
    /// First object of the read-only primitive partition.
    pub first_read_only_primitive: FieldId,
    /// Last object of the read-only primitive partition.
    pub last_read_only_primitive: FieldId,
    /// First object of the read-only reference partition.
    pub first_read_only_reference: FieldId,
    /// Last object of the read-only reference partition.
    pub last_read_only_reference: FieldId,
    /// First object of the writable primitive partition.
    pub first_writable_primitive: FieldId,
    /// Last object of the writable primitive partition.
    pub last_writable_primitive: FieldId,
    /// First object of the writable reference partition.
    pub first_writable_reference: FieldId,
    /// Last object of the writable reference partition.
    pub last_writable_reference: FieldId,
}

/// Consumer of the sorted intern table the builder produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringInternSupport {
    /// The static `String[]` slot holding the table.
    pub field: FieldId,
    /// The image intern array, once the builder has frozen interning.
    pub image_array: Option<HostRef>,
}
