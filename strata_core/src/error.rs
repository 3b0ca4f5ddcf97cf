//! Fatal build errors.
//!
//! Every error aborts the build. Errors that point at a concrete object
//! carry a pre-rendered provenance chain: the sequence of objects that made
//! the offending one reachable, ending at a root tag. The builder renders
//! the chain because only it knows the reason links; this type just holds
//! and formats the text.

/// A fatal image-heap build error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// An object's class was not marked instantiated by the static analyzer.
    UnreachableType {
        /// Description of the offending object.
        object: String,
        /// Provenance chain, one line per step, ending at a root tag.
        chain: String,
    },
    /// A referenced target had no image identity at write time: a static
    /// field or a reachable object changed after analysis.
    TargetChanged {
        /// Description of the missing target.
        object: String,
        /// Provenance chain of the referencing object.
        chain: String,
    },
    /// An operation ran outside its allowed phase window.
    PhaseViolation {
        /// The operation that was attempted.
        operation: &'static str,
        /// The phase the guard was in.
        phase: &'static str,
    },
    /// An object offset or field index was not reference-aligned.
    Misaligned {
        /// What was misaligned.
        what: String,
        /// The offending offset.
        offset: u64,
    },
    /// A non-data relocation targeted something that is not a known method
    /// pointer.
    UnknownRelocation {
        /// Description of the unexpected target.
        what: String,
    },
    /// An object of an unrecognized shape reached the image heap.
    UnrecognizedObject {
        /// Description of the offending entity.
        what: String,
    },
}

impl ImageError {
    /// Unreachable-type error with the standard user guidance.
    pub fn unreachable_type(object: impl Into<String>, chain: impl Into<String>) -> Self {
        ImageError::UnreachableType {
            object: object.into(),
            chain: chain.into(),
        }
    }

    /// Late-mutation error for a write-time target without an image identity.
    pub fn target_changed(object: impl Into<String>, chain: impl Into<String>) -> Self {
        ImageError::TargetChanged {
            object: object.into(),
            chain: chain.into(),
        }
    }

    /// Phase-window violation.
    pub fn phase(operation: &'static str, phase: &'static str) -> Self {
        ImageError::PhaseViolation { operation, phase }
    }

    /// Alignment violation.
    pub fn misaligned(what: impl Into<String>, offset: u64) -> Self {
        ImageError::Misaligned {
            what: what.into(),
            offset,
        }
    }

    /// Unknown non-data relocation target.
    pub fn unknown_relocation(what: impl Into<String>) -> Self {
        ImageError::UnknownRelocation { what: what.into() }
    }

    /// Unrecognized object shape.
    pub fn unrecognized(what: impl Into<String>) -> Self {
        ImageError::UnrecognizedObject { what: what.into() }
    }
}

// Display is long-form on purpose: these messages are the user's only
// window into a failed build.
impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::UnreachableType { object, chain } => write!(
                f,
                "image heap writing found an object whose class was not seen as \
                 instantiated during static analysis. Did a static field or an object \
                 referenced from a static field change during image generation?\n  \
                 object: {}\n  reachable through:\n{}",
                object, chain
            ),
            ImageError::TargetChanged { object, chain } => write!(
                f,
                "static field or object referenced from a static field changed during \
                 image generation\n  object: {}\n  reachable through:\n{}",
                object, chain
            ),
            ImageError::PhaseViolation { operation, phase } => {
                write!(f, "{} is not allowed during phase {}", operation, phase)
            }
            ImageError::Misaligned { what, offset } => {
                write!(f, "{}: offset {} must be reference-aligned", what, offset)
            }
            ImageError::UnknownRelocation { what } => {
                write!(f, "cannot create relocation for unknown pointer: {}", what)
            }
            ImageError::UnrecognizedObject { what } => {
                write!(f, "unrecognized object in image heap: {}", what)
            }
        }
    }
}

impl std::error::Error for ImageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_violation_message() {
        let err = ImageError::phase("addObject", "AFTER");
        assert_eq!(err.to_string(), "addObject is not allowed during phase AFTER");
    }

    #[test]
    fn test_unreachable_type_carries_chain() {
        let err = ImageError::unreachable_type("instance of Cache", "    root: static fields\n");
        let text = err.to_string();
        assert!(text.contains("instance of Cache"));
        assert!(text.contains("root: static fields"));
        assert!(text.contains("static analysis"));
    }

    #[test]
    fn test_misaligned_message() {
        let err = ImageError::misaligned("field index", 12);
        assert!(err.to_string().contains("12"));
    }
}
