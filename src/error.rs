//! Error types for index operations

use std::collections::TryReserveError;

use thiserror::Error;

use crate::index::Label;

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, FlatKnnError>;

/// Error types that can occur in index operations.
///
/// Every variant is raised before any caller-owned output buffer is written.
#[derive(Error, Debug)]
pub enum FlatKnnError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid dimension: vectors must have at least one component")]
    InvalidDimension,

    #[error("Index is not trained")]
    NotTrained,

    #[error("Permutation is stale ({perm_len} entries for {ntotal} vectors): call update_permutation before search")]
    PermutationStale { ntotal: usize, perm_len: usize },

    #[error("Shift array has {shift_len} entries but index holds {ntotal} vectors")]
    ShiftSizeMismatch { ntotal: usize, shift_len: usize },

    #[error("Operation not supported by this index: {operation}")]
    Unsupported { operation: &'static str },

    #[error("Base index must be empty at construction, holds {ntotal} vectors")]
    BaseNotEmpty { ntotal: usize },

    #[error("Label {label} out of range for index holding {ntotal} vectors")]
    LabelOutOfRange { label: Label, ntotal: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Allocation failed: {0}")]
    Allocation(#[from] TryReserveError),
}
