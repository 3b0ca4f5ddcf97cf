//! Image records for canonical objects.
//!
//! One `ObjectInfo` exists per canonical image object; host duplicates
//! alias it through the identity map. Infos live in an arena and refer to
//! each other through `InfoId` reason links, which reconstruct the
//! provenance chain for error messages.

use crate::partition::{HeapPartition, PartitionKind};
use strata_meta::{FieldId, HostRef, TypeId};

/// Index of an `ObjectInfo` in the builder's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoId(u32);

impl InfoId {
    pub(crate) fn from_index(index: usize) -> Self {
        InfoId(index as u32)
    }

    /// Arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Why an object is in the image heap: the parent that referenced it, the
/// static field it was read from, or a root tag. Used only for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// A named root set.
    Root(&'static str),
    /// Read out of a static field.
    Field(FieldId),
    /// Referenced from another image object.
    Object(InfoId),
}

/// The image record of one canonical object.
#[derive(Debug)]
pub struct ObjectInfo {
    /// The canonical host object this info represents.
    pub object: HostRef,
    /// Its image class.
    pub class: TypeId,
    /// The partition the object was placed in.
    pub partition: PartitionKind,
    /// Byte offset within the partition. Immutable once created.
    pub offset_in_partition: u64,
    /// Aligned byte size. Immutable once created.
    pub size: u64,
    /// Provenance link for error messages.
    pub reason: Reason,
    identity_hash: i32,
    hash_upgraded: bool,
}

impl ObjectInfo {
    /// Record a canonical object appended at the partition's current end.
    pub fn new(
        object: HostRef,
        class: TypeId,
        partition: PartitionKind,
        offset_in_partition: u64,
        size: u64,
        identity_hash: i32,
        reason: Reason,
    ) -> Self {
        Self {
            object,
            class,
            partition,
            offset_in_partition,
            size,
            reason,
            identity_hash,
            hash_upgraded: false,
        }
    }

    /// The 32-bit identity hash written into the object header area.
    #[inline]
    pub fn identity_hash(&self) -> i32 {
        self.identity_hash
    }

    /// Reconcile the hash when the same canonical object is reached from a
    /// second host object.
    ///
    /// The hub and the class mirror both map to the hub in the image, which
    /// leaves two host hashes to pick from. Data structures built over
    /// mirrors keep working at run time only with the mirror's hash, so a
    /// mirror-derived hash replaces a hub-derived one, exactly once.
    pub fn update(&mut self, original_is_mirror: bool, identity_hash: i32) {
        if original_is_mirror && !self.hash_upgraded && self.identity_hash != identity_hash {
            self.identity_hash = identity_hash;
            self.hash_upgraded = true;
        }
    }

    /// The object's start within its section.
    #[inline]
    pub fn offset_in_section(&self, partition: &HeapPartition) -> u64 {
        debug_assert_eq!(partition.kind(), self.partition);
        partition.offset_in_section_of(self.offset_in_partition)
    }

    /// A byte index within this object, as a section offset.
    #[inline]
    pub fn index_in_section(&self, partition: &HeapPartition, offset: u64) -> u64 {
        debug_assert!(
            offset < self.size,
            "index {} out of bounds: [0 .. {})",
            offset,
            self.size
        );
        self.offset_in_section(partition) + offset
    }
}
