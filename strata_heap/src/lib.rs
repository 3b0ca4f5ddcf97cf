//! Strata image-heap builder.
//!
//! Builds the initial in-memory image of a statically compiled program:
//! given a root set of live host objects, it produces the exact byte layout
//! of that object graph as it must appear at program start, plus the
//! relocations the link step patches.
//!
//! # Architecture
//!
//! The builder does four intertwined jobs:
//!
//! - **Traversal**: drains a LIFO worklist from the roots, deciding for
//!   each host object whether it appears in the image and under which
//!   identity.
//! - **Canonicalization**: collapses host duplicates of value-like objects
//!   (strings, literal primitive arrays, hubs) to one image object.
//! - **Partitioning**: places every image object in one of four append-only
//!   partitions along {writable, read-only} x {references, primitive}.
//! - **Writing**: serializes each object into the read-only or writable
//!   buffer, emitting encoded references or relocation records for every
//!   outgoing pointer, then patches the partition boundary markers.
//!
//! Identity, size, hash code, and reference encoding must stay consistent
//! across the whole traversal; phases gate every mutation window so a late
//! add or intern fails loudly instead of corrupting offsets.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod canonical;
pub mod histogram;
pub mod object_info;
pub mod partition;
pub mod phase;
pub mod reloc;
pub mod worklist;

mod writer;

pub use builder::NativeImageHeap;
pub use canonical::CanonicalKey;
pub use object_info::{InfoId, ObjectInfo, Reason};
pub use partition::{HeapPartition, PartitionKind};
pub use phase::Phase;
pub use reloc::{RelocTarget, RelocatableBuffer, Relocation};
pub use worklist::{AddObjectWorklist, AddTask};
