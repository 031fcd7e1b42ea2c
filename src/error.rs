//! Graphics error types.

use std::fmt;

/// Errors that can occur in the graphics system.
///
/// Validation failures are reported before any state is mutated, so a failed
/// operation always leaves the previous state intact. Allocation failures are
/// fatal and propagated; nothing in this crate retries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// A render-target set or draw request failed validation.
    Validation(String),
    /// Out of GPU memory.
    OutOfMemory,
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// Unbalanced stack usage or a request that can never be satisfied.
    Misuse(String),
    /// A handle did not resolve to a registered entry.
    OutOfRange(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "validation failed: {msg}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::Misuse(msg) => write!(f, "misuse: {msg}"),
            Self::OutOfRange(msg) => write!(f, "out of range: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::Validation("mismatched dimensions".to_string());
        assert_eq!(err.to_string(), "validation failed: mismatched dimensions");

        let err = GraphicsError::Misuse("more pops than pushes".to_string());
        assert_eq!(err.to_string(), "misuse: more pops than pushes");
    }
}
