//! Error types for scan processing.
//!
//! Public operations across the scan crates never surface these to callers of
//! the non-failing API; they are logged and the operation falls back to the
//! unchanged input or an empty result. The `try_*` variants return them.

use thiserror::Error;

/// Result type for scan processing operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while validating or processing scan data.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ScanError {
    /// Input data is malformed (mismatched parallel arrays, empty buffers).
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of the problem.
        reason: String,
    },

    /// A buffer does not have the size implied by its dimensions.
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },

    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {index} (patch has {vertex_count} vertices)")]
    InvalidFaceIndex {
        /// Index of the offending face.
        face: usize,
        /// The out-of-range vertex index.
        index: u32,
        /// Number of vertices in the patch.
        vertex_count: usize,
    },

    /// A configuration value makes the computation impossible.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the problem.
        reason: String,
    },

    /// The single-writer resource is held by another caller.
    #[error("resource is busy")]
    Busy,

    /// A batch operation was cancelled between items.
    #[error("operation cancelled")]
    Cancelled,
}

impl ScanError {
    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Creates a buffer size mismatch error.
    #[must_use]
    pub const fn buffer_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }

    /// Returns true for errors caused by malformed data rather than configuration.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::BufferSizeMismatch { .. } | Self::InvalidFaceIndex { .. }
        )
    }
}
