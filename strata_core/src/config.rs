//! Build configuration.
//!
//! One record holds every knob the builder consults. The original system
//! read these from process-wide singletons; here they are injected at
//! construction and live exactly as long as one build.

use crate::layout::ObjectLayout;

/// Configuration for one image-heap build.
///
/// # Example
///
/// ```ignore
/// use strata_core::ImageConfig;
///
/// let config = ImageConfig {
///     compression_shift: 3,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Encode references relative to a heap base register.
    ///
    /// When enabled, outgoing references are written as in-section offsets
    /// (shifted by `compression_shift`) instead of link-time relocations,
    /// and the read-only primitive partition starts with one alignment unit
    /// of padding so no object offset is zero.
    ///
    /// Default: true
    pub use_heap_base: bool,

    /// Support spawning multiple isolates from one image.
    ///
    /// Requires `use_heap_base`.
    ///
    /// Default: false
    pub spawn_isolates: bool,

    /// Right shift applied to in-section offsets before emission.
    ///
    /// Must not discard alignment bits: `1 << compression_shift` may not
    /// exceed the object alignment.
    ///
    /// Default: 0
    pub compression_shift: u32,

    /// Header bits OR'd into every emitted hub word, marking the object as
    /// part of the initial image. Must fit below the object alignment.
    ///
    /// Default: 1
    pub object_header_bits: u64,

    /// Emergency flag: force every object into the writable reference
    /// partition. Incompatible with `spawn_isolates`.
    ///
    /// Default: false
    pub use_only_writable_heap: bool,

    /// Print a per-partition histogram of image objects after writing.
    ///
    /// Default: false
    pub print_heap_histogram: bool,

    /// Print the final size of each partition after writing.
    ///
    /// Default: false
    pub print_partition_sizes: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            use_heap_base: true,
            spawn_isolates: false,
            compression_shift: 0,
            object_header_bits: 1,
            use_only_writable_heap: false,
            print_heap_histogram: false,
            print_partition_sizes: false,
        }
    }
}

impl ImageConfig {
    /// Configuration for isolate-capable images.
    pub fn isolates() -> Self {
        Self {
            use_heap_base: true,
            spawn_isolates: true,
            ..Default::default()
        }
    }

    /// Configuration without a heap base: every reference becomes a
    /// link-time relocation.
    pub fn relocation_only() -> Self {
        Self {
            use_heap_base: false,
            object_header_bits: 0,
            ..Default::default()
        }
    }

    /// Does reference encoding go through the heap base?
    #[inline]
    pub fn uses_heap_base(&self) -> bool {
        self.use_heap_base
    }

    /// Validate configuration values against the object layout.
    pub fn validate(&self, layout: &ObjectLayout) -> Result<(), ConfigError> {
        if self.spawn_isolates && !self.use_heap_base {
            return Err(ConfigError::IsolatesRequireHeapBase);
        }
        if self.use_only_writable_heap && self.spawn_isolates {
            return Err(ConfigError::WritableHeapExcludesIsolates);
        }
        if 1u64 << self.compression_shift > layout.alignment {
            return Err(ConfigError::ShiftDiscardsAlignment);
        }
        if self.object_header_bits >= layout.alignment {
            return Err(ConfigError::HeaderBitsTooWide);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `spawn_isolates` requires `use_heap_base`.
    IsolatesRequireHeapBase,
    /// `use_only_writable_heap` must be disabled when spawning isolates.
    WritableHeapExcludesIsolates,
    /// The compression shift discards alignment bits of object offsets.
    ShiftDiscardsAlignment,
    /// Object header bits collide with aligned object offsets.
    HeaderBitsTooWide,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IsolatesRequireHeapBase => {
                write!(f, "spawning isolates requires heap-base addressing")
            }
            ConfigError::WritableHeapExcludesIsolates => {
                write!(
                    f,
                    "the writable-only image heap cannot be combined with isolates"
                )
            }
            ConfigError::ShiftDiscardsAlignment => {
                write!(f, "compression shift exceeds the object alignment")
            }
            ConfigError::HeaderBitsTooWide => {
                write!(f, "object header bits must fit below the object alignment")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
