//! Strata metadata layer.
//!
//! Everything the image-heap builder consumes but does not own:
//!
//! - **Host heap**: the arena of host-side objects discovered during
//!   ahead-of-time compilation. A [`host::HostRef`] is a host identity; the
//!   builder's identity map is keyed by it.
//! - **Universe**: image types, fields, methods, and hubs, with typed field
//!   accessors so the builder never reflects over untyped data.
//! - **Hybrid layouts**: classes whose memory form embeds a trailing array
//!   and optionally a bit set in the same allocation.
//! - **Static-field support**: the placeholder arrays static slots live in,
//!   the runtime-info boundary fields, and the string-intern table hookup.

#![warn(clippy::all)]

pub mod host;
pub mod hybrid;
pub mod statics;
pub mod universe;

pub use host::{ArrayData, HostHeap, HostObject, HostRef, HostValue};
pub use hybrid::HybridLayout;
pub use statics::{BoundaryFields, StaticFieldsSupport, StringInternSupport};
pub use universe::{
    FieldFlags, FieldId, FieldMeta, FieldSpec, HybridInfo, HybridSpec, ImageType, InstanceType,
    MethodId, MethodMeta, TypeId, TypeKind, TypeOptions, Universe,
};
