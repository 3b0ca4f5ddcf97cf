//! Strata core types.
//!
//! Leaf crate shared by the metadata layer and the image-heap builder:
//!
//! - **Kinds**: the primitive/reference value kinds objects are made of.
//! - **Layout**: the object layout constant record (header geometry,
//!   alignment, array geometry) that all size and offset math flows through.
//! - **Config**: the build configuration injected into the builder
//!   (reference encoding, diagnostics, emergency flags).
//! - **Errors**: the fatal build error type carrying a provenance chain.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod kind;
pub mod layout;

pub use config::{ConfigError, ImageConfig};
pub use error::ImageError;
pub use kind::Kind;
pub use layout::ObjectLayout;
